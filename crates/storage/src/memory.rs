// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store for tests and embedding.

use crate::state::{ApplyOutcome, DeleteOutcome, StoreState};
use async_trait::async_trait;
use krec_adapters::{ConfigData, ReferenceStore, SecretData, StoreError, WorkspaceStore};
use krec_core::{Clock, ResourceId, SystemClock, Workspace};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// A recorded token request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRequest {
    pub namespace: String,
    pub service_account: String,
    pub audience: String,
    pub validity: Duration,
}

#[derive(Default)]
struct MemoryInner {
    state: StoreState,
    service_accounts: BTreeSet<(String, String)>,
    token_requests: Vec<TokenRequest>,
    failing_status_writes: usize,
    writes: usize,
}

/// Store backed by a shared [`StoreState`]. Clones share the same objects.
#[derive(Clone)]
pub struct MemoryStore<C: Clock = SystemClock> {
    inner: Arc<Mutex<MemoryInner>>,
    clock: C,
}

impl Default for MemoryStore<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore<SystemClock> {
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }
}

impl<C: Clock> MemoryStore<C> {
    pub fn with_clock(clock: C) -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryInner::default())),
            clock,
        }
    }

    /// Create or update a workspace from its desired form.
    pub fn apply(&self, workspace: Workspace) -> ApplyOutcome {
        self.inner.lock().state.apply(workspace)
    }

    pub fn mark_for_deletion(&self, id: &ResourceId) -> DeleteOutcome {
        let now = self.clock.epoch_ms();
        self.inner.lock().state.mark_for_deletion(id, now)
    }

    /// Current stored form, bypassing the async interface.
    pub fn snapshot(&self, id: &ResourceId) -> Option<Workspace> {
        self.inner.lock().state.get(id).cloned()
    }

    pub fn put_config_map(&self, namespace: &str, name: &str, data: ConfigData) {
        self.inner.lock().state.put_config_map(namespace, name, data);
    }

    pub fn put_secret(&self, namespace: &str, name: &str, data: SecretData) {
        self.inner.lock().state.put_secret(namespace, name, data);
    }

    /// Allow tokens to be issued for a service account.
    pub fn add_service_account(&self, namespace: &str, name: &str) {
        self.inner
            .lock()
            .service_accounts
            .insert((namespace.to_string(), name.to_string()));
    }

    pub fn token_requests(&self) -> Vec<TokenRequest> {
        self.inner.lock().token_requests.clone()
    }

    /// Fail the next `n` status writes with a conflict.
    pub fn fail_status_writes(&self, n: usize) {
        self.inner.lock().failing_status_writes = n;
    }

    /// Number of successful writes (update and update_status).
    pub fn write_count(&self) -> usize {
        self.inner.lock().writes
    }
}

#[async_trait]
impl<C: Clock> WorkspaceStore for MemoryStore<C> {
    async fn get(&self, id: &ResourceId) -> Result<Option<Workspace>, StoreError> {
        Ok(self.inner.lock().state.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Workspace>, StoreError> {
        Ok(self.inner.lock().state.list())
    }

    async fn update(&self, workspace: &Workspace) -> Result<Workspace, StoreError> {
        let mut inner = self.inner.lock();
        let stored = inner.state.update(workspace)?;
        inner.writes += 1;
        Ok(stored)
    }

    async fn update_status(&self, workspace: &Workspace) -> Result<Workspace, StoreError> {
        let mut inner = self.inner.lock();
        if inner.failing_status_writes > 0 {
            inner.failing_status_writes -= 1;
            return Err(StoreError::Conflict {
                resource: workspace.id(),
                stored: workspace.metadata.resource_version + 1,
                given: workspace.metadata.resource_version,
            });
        }
        let stored = inner.state.update_status(workspace)?;
        inner.writes += 1;
        Ok(stored)
    }

    async fn issue_token(
        &self,
        namespace: &str,
        service_account: &str,
        audience: &str,
        validity: Duration,
    ) -> Result<String, StoreError> {
        let mut inner = self.inner.lock();
        let account = (namespace.to_string(), service_account.to_string());
        if !inner.service_accounts.contains(&account) {
            return Err(StoreError::TokenIssuance {
                namespace: namespace.to_string(),
                name: service_account.to_string(),
                message: "service account not found".to_string(),
            });
        }
        inner.token_requests.push(TokenRequest {
            namespace: namespace.to_string(),
            service_account: service_account.to_string(),
            audience: audience.to_string(),
            validity,
        });
        Ok(format!(
            "token.{namespace}.{service_account}.{}",
            inner.token_requests.len()
        ))
    }
}

#[async_trait]
impl<C: Clock> ReferenceStore for MemoryStore<C> {
    async fn config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigData>, StoreError> {
        Ok(self.inner.lock().state.config_map(namespace, name).cloned())
    }

    async fn secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, StoreError> {
        Ok(self.inner.lock().state.secret(namespace, name).cloned())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
