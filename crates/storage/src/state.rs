// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory object table with store semantics.
//!
//! * `generation` counts spec changes (and the start of deletion).
//! * `resource_version` changes on every write; writes carrying an older
//!   version are rejected with a conflict.
//! * A deleting object is removed once its last finalizer is gone.

use krec_adapters::{ConfigData, SecretData, StoreError};
use krec_core::{ResourceId, Workspace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Result of applying a desired workspace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    Created,
    Updated,
    Unchanged,
}

/// Result of a deletion request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    /// No finalizers; the object is gone
    Removed,
    /// Finalizers pending; the object is marked with a deletion timestamp
    Marked,
    NotFound,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    workspaces: BTreeMap<String, Workspace>,
    #[serde(default)]
    config_maps: BTreeMap<String, ConfigData>,
    #[serde(default)]
    secrets: BTreeMap<String, SecretData>,
    #[serde(default)]
    last_resource_version: u64,
}

fn key(namespace: &str, name: &str) -> String {
    format!("{namespace}/{name}")
}

impl StoreState {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_version(&mut self) -> u64 {
        self.last_resource_version += 1;
        self.last_resource_version
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Workspace> {
        self.workspaces.get(&id.to_string())
    }

    pub fn list(&self) -> Vec<Workspace> {
        self.workspaces.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.workspaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workspaces.is_empty()
    }

    /// Create or update a workspace from its desired form.
    ///
    /// Only the `spec` field is taken from `desired`; finalizers, status and deletion
    /// state of an existing object are kept.
    pub fn apply(&mut self, desired: Workspace) -> ApplyOutcome {
        let k = desired.id().to_string();
        match self.workspaces.get(&k) {
            Some(existing) if existing.spec == desired.spec => ApplyOutcome::Unchanged,
            Some(existing) => {
                let mut updated = existing.clone();
                updated.spec = desired.spec;
                updated.metadata.generation += 1;
                updated.metadata.resource_version = self.next_version();
                self.workspaces.insert(k, updated);
                ApplyOutcome::Updated
            }
            None => {
                let mut created = desired;
                created.metadata.generation = 1;
                created.metadata.resource_version = self.next_version();
                created.metadata.deletion_timestamp_ms = None;
                created.status = Default::default();
                self.workspaces.insert(k, created);
                ApplyOutcome::Created
            }
        }
    }

    fn check_version(&self, workspace: &Workspace) -> Result<&Workspace, StoreError> {
        let id = workspace.id();
        let stored = self
            .workspaces
            .get(&id.to_string())
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        if stored.metadata.resource_version != workspace.metadata.resource_version {
            return Err(StoreError::Conflict {
                resource: id,
                stored: stored.metadata.resource_version,
                given: workspace.metadata.resource_version,
            });
        }
        Ok(stored)
    }

    /// Write metadata and spec. Removing the last finalizer of a deleting
    /// object removes the object; the returned value is its final form.
    pub fn update(&mut self, workspace: &Workspace) -> Result<Workspace, StoreError> {
        let stored = self.check_version(workspace)?;
        let mut updated = stored.clone();
        if updated.spec != workspace.spec {
            updated.spec = workspace.spec.clone();
            updated.metadata.generation += 1;
        }
        updated.metadata.finalizers = workspace.metadata.finalizers.clone();
        updated.metadata.resource_version = self.next_version();

        let k = updated.id().to_string();
        if updated.metadata.is_deleting() && updated.metadata.finalizers.is_empty() {
            self.workspaces.remove(&k);
            tracing::debug!(resource = %k, "last finalizer removed, object deleted");
        } else {
            self.workspaces.insert(k, updated.clone());
        }
        Ok(updated)
    }

    /// Write only the status.
    pub fn update_status(&mut self, workspace: &Workspace) -> Result<Workspace, StoreError> {
        let stored = self.check_version(workspace)?;
        let mut updated = stored.clone();
        updated.status = workspace.status.clone();
        updated.metadata.resource_version = self.next_version();
        self.workspaces
            .insert(updated.id().to_string(), updated.clone());
        Ok(updated)
    }

    /// Request deletion at `now_ms`.
    pub fn mark_for_deletion(&mut self, id: &ResourceId, now_ms: u64) -> DeleteOutcome {
        let k = id.to_string();
        let Some(stored) = self.workspaces.get(&k) else {
            return DeleteOutcome::NotFound;
        };
        if stored.metadata.finalizers.is_empty() {
            self.workspaces.remove(&k);
            return DeleteOutcome::Removed;
        }
        if stored.metadata.is_deleting() {
            return DeleteOutcome::Marked;
        }

        let version = self.next_version();
        if let Some(stored) = self.workspaces.get_mut(&k) {
            stored.metadata.deletion_timestamp_ms = Some(now_ms);
            stored.metadata.generation += 1;
            stored.metadata.resource_version = version;
        }
        DeleteOutcome::Marked
    }

    pub fn config_map(&self, namespace: &str, name: &str) -> Option<&ConfigData> {
        self.config_maps.get(&key(namespace, name))
    }

    pub fn put_config_map(&mut self, namespace: &str, name: &str, data: ConfigData) {
        self.config_maps.insert(key(namespace, name), data);
    }

    pub fn remove_config_map(&mut self, namespace: &str, name: &str) -> bool {
        self.config_maps.remove(&key(namespace, name)).is_some()
    }

    pub fn secret(&self, namespace: &str, name: &str) -> Option<&SecretData> {
        self.secrets.get(&key(namespace, name))
    }

    pub fn put_secret(&mut self, namespace: &str, name: &str, data: SecretData) {
        self.secrets.insert(key(namespace, name), data);
    }

    pub fn remove_secret(&mut self, namespace: &str, name: &str) -> bool {
        self.secrets.remove(&key(namespace, name)).is_some()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
