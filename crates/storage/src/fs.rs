// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File-backed store.
//!
//! Layout under the state directory:
//!
//! ```text
//! store.json                         snapshot of every object
//! serviceaccounts/<ns>/<name>.token  identity tokens handed out by issue_token
//! ```
//!
//! Desired objects come from a separate manifests directory and are
//! ingested by [`FsStore::sync_manifests`].

use crate::manifest::{Manifest, ManifestKey, ManifestKind};
use crate::snapshot::Snapshot;
use crate::state::{ApplyOutcome, DeleteOutcome, StoreState};
use async_trait::async_trait;
use krec_adapters::{ConfigData, ReferenceStore, SecretData, StoreError, WorkspaceStore};
use krec_core::{Clock, ResourceId, SystemClock, Workspace};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

pub const SNAPSHOT_FILE: &str = "store.json";
pub const TOKENS_DIR: &str = "serviceaccounts";

/// What one manifest sync changed.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Files that could not be read or parsed; their previous objects are kept
    pub invalid: Vec<PathBuf>,
}

impl SyncReport {
    pub fn is_empty(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.deleted == 0 && self.invalid.is_empty()
    }
}

struct FsInner {
    snapshot: Snapshot,
    snapshot_path: PathBuf,
}

impl FsInner {
    /// Run `change` against a copy and commit it only once persisted.
    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut Snapshot) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let mut next = self.snapshot.clone();
        let out = change(&mut next)?;
        if next != self.snapshot {
            next.save(&self.snapshot_path)?;
            self.snapshot = next;
        }
        Ok(out)
    }
}

#[derive(Clone)]
pub struct FsStore<C: Clock = SystemClock> {
    inner: Arc<Mutex<FsInner>>,
    manifests_dir: PathBuf,
    tokens_dir: PathBuf,
    clock: C,
}

impl FsStore<SystemClock> {
    pub fn open(state_dir: &Path, manifests_dir: &Path) -> Result<Self, StoreError> {
        Self::open_with_clock(state_dir, manifests_dir, SystemClock)
    }
}

impl<C: Clock> FsStore<C> {
    pub fn open_with_clock(
        state_dir: &Path,
        manifests_dir: &Path,
        clock: C,
    ) -> Result<Self, StoreError> {
        let snapshot_path = state_dir.join(SNAPSHOT_FILE);
        let snapshot =
            Snapshot::load(&snapshot_path)?.unwrap_or_else(|| Snapshot::new(StoreState::new()));
        tracing::info!(
            path = %snapshot_path.display(),
            workspaces = snapshot.state.len(),
            "store opened"
        );
        Ok(Self {
            inner: Arc::new(Mutex::new(FsInner {
                snapshot,
                snapshot_path,
            })),
            manifests_dir: manifests_dir.to_path_buf(),
            tokens_dir: state_dir.join(TOKENS_DIR),
            clock,
        })
    }

    pub fn manifests_dir(&self) -> &Path {
        &self.manifests_dir
    }

    /// Bring the store in line with the manifests directory.
    ///
    /// New and changed files are applied. Objects whose file disappeared are
    /// deleted; workspaces go through finalizer-aware deletion.
    pub fn sync_manifests(&self) -> Result<SyncReport, StoreError> {
        let files = self.read_manifests()?;
        let now = self.clock.epoch_ms();

        self.inner.lock().commit(|snapshot| {
            let mut report = SyncReport::default();
            let mut seen: BTreeMap<String, ManifestKey> = BTreeMap::new();

            for (file, parsed) in files {
                match parsed {
                    Ok(manifest) => {
                        seen.insert(file, manifest.key());
                        ingest(&mut snapshot.state, manifest, &mut report);
                    }
                    Err(path) => {
                        // Keep whatever the file declared last time
                        if let Some(key) = snapshot.manifests.get(&file) {
                            seen.insert(file, key.clone());
                        }
                        report.invalid.push(path);
                    }
                }
            }

            let removed: Vec<ManifestKey> = snapshot
                .manifests
                .iter()
                .filter(|(file, _)| !seen.contains_key(*file))
                .map(|(_, key)| key.clone())
                .filter(|key| !seen.values().any(|k| k == key))
                .collect();
            for key in removed {
                if remove(&mut snapshot.state, &key, now) {
                    report.deleted += 1;
                }
            }

            snapshot.manifests = seen;
            Ok(report)
        })
    }

    /// Manifest file name to its parse result, in name order.
    fn read_manifests(&self) -> Result<Vec<(String, Result<Manifest, PathBuf>)>, StoreError> {
        let dir = &self.manifests_dir;
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let io = |source| StoreError::Io {
            path: dir.clone(),
            source,
        };

        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(io)? {
            let path = entry.map_err(io)?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()).map(String::from) else {
                continue;
            };
            let parsed = Manifest::load(&path).map_err(|e| {
                tracing::warn!(path = %path.display(), error = %e, "skipping manifest");
                path.clone()
            });
            files.push((name, parsed));
        }
        files.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(files)
    }
}

fn ingest(state: &mut StoreState, manifest: Manifest, report: &mut SyncReport) {
    match manifest {
        Manifest::Workspace(ws) => {
            let id = ws.id();
            match state.apply(ws) {
                ApplyOutcome::Created => {
                    tracing::info!(resource = %id, "workspace created");
                    report.created += 1;
                }
                ApplyOutcome::Updated => {
                    tracing::info!(resource = %id, "workspace spec changed");
                    report.updated += 1;
                }
                ApplyOutcome::Unchanged => {}
            }
        }
        Manifest::ConfigMap { metadata, data } => {
            if state.config_map(&metadata.namespace, &metadata.name) != Some(&data) {
                state.put_config_map(&metadata.namespace, &metadata.name, data);
                report.updated += 1;
            }
        }
        Manifest::Secret { metadata, data } => {
            if state.secret(&metadata.namespace, &metadata.name) != Some(&data) {
                state.put_secret(&metadata.namespace, &metadata.name, data);
                report.updated += 1;
            }
        }
    }
}

fn remove(state: &mut StoreState, key: &ManifestKey, now_ms: u64) -> bool {
    match key.kind {
        ManifestKind::Workspace => {
            let id = ResourceId::new(&key.namespace, &key.name);
            let outcome = state.mark_for_deletion(&id, now_ms);
            tracing::info!(resource = %id, ?outcome, "workspace manifest removed");
            outcome != DeleteOutcome::NotFound
        }
        ManifestKind::ConfigMap => state.remove_config_map(&key.namespace, &key.name),
        ManifestKind::Secret => state.remove_secret(&key.namespace, &key.name),
    }
}

#[async_trait]
impl<C: Clock> WorkspaceStore for FsStore<C> {
    async fn get(&self, id: &ResourceId) -> Result<Option<Workspace>, StoreError> {
        Ok(self.inner.lock().snapshot.state.get(id).cloned())
    }

    async fn list(&self) -> Result<Vec<Workspace>, StoreError> {
        Ok(self.inner.lock().snapshot.state.list())
    }

    async fn update(&self, workspace: &Workspace) -> Result<Workspace, StoreError> {
        self.inner
            .lock()
            .commit(|snapshot| snapshot.state.update(workspace))
    }

    async fn update_status(&self, workspace: &Workspace) -> Result<Workspace, StoreError> {
        self.inner
            .lock()
            .commit(|snapshot| snapshot.state.update_status(workspace))
    }

    async fn issue_token(
        &self,
        namespace: &str,
        service_account: &str,
        audience: &str,
        validity: Duration,
    ) -> Result<String, StoreError> {
        let path = self
            .tokens_dir
            .join(namespace)
            .join(format!("{service_account}.token"));
        tracing::debug!(
            path = %path.display(),
            audience,
            validity_secs = validity.as_secs(),
            "reading service account token"
        );
        let token = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| StoreError::TokenIssuance {
                namespace: namespace.to_string(),
                name: service_account.to_string(),
                message: format!("{}: {e}", path.display()),
            })?;
        let token = token.trim();
        if token.is_empty() {
            return Err(StoreError::TokenIssuance {
                namespace: namespace.to_string(),
                name: service_account.to_string(),
                message: format!("{} is empty", path.display()),
            });
        }
        Ok(token.to_string())
    }
}

#[async_trait]
impl<C: Clock> ReferenceStore for FsStore<C> {
    async fn config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigData>, StoreError> {
        Ok(self
            .inner
            .lock()
            .snapshot
            .state
            .config_map(namespace, name)
            .cloned())
    }

    async fn secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, StoreError> {
        Ok(self
            .inner
            .lock()
            .snapshot
            .state
            .secret(namespace, name)
            .cloned())
    }
}

#[cfg(test)]
#[path = "fs_tests.rs"]
mod tests;
