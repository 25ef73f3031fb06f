// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reconciler tests

mod deletion;
mod environment;
mod failures;
mod lifecycle;

use super::*;
use async_trait::async_trait;
use krec_adapters::{
    ConfigData, FakeInstaller, FakeNotifyAdapter, FakeTerraformAdapter, SecretData, StoreError,
    TerraformVerb,
};
use krec_core::test_support::WorkspaceBuilder;
use krec_core::{FakeClock, WorkspaceStatus};
use krec_storage::MemoryStore;
use parking_lot::Mutex;
use std::sync::Arc;
use tempfile::TempDir;

/// A write that reached the store
#[derive(Debug, Clone, PartialEq)]
enum StoreWrite {
    Status(WorkspaceStatus),
    Finalizers(Vec<String>),
}

/// Memory store that records every successful write in order
#[derive(Clone)]
struct RecordingStore {
    inner: MemoryStore<FakeClock>,
    writes: Arc<Mutex<Vec<StoreWrite>>>,
}

impl RecordingStore {
    fn writes(&self) -> Vec<StoreWrite> {
        self.writes.lock().clone()
    }

    fn status_writes(&self) -> Vec<WorkspaceStatus> {
        self.writes()
            .into_iter()
            .filter_map(|w| match w {
                StoreWrite::Status(status) => Some(status),
                StoreWrite::Finalizers(_) => None,
            })
            .collect()
    }

    fn clear_writes(&self) {
        self.writes.lock().clear();
    }
}

#[async_trait]
impl WorkspaceStore for RecordingStore {
    async fn get(&self, id: &ResourceId) -> Result<Option<Workspace>, StoreError> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<Workspace>, StoreError> {
        self.inner.list().await
    }

    async fn update(&self, workspace: &Workspace) -> Result<Workspace, StoreError> {
        let stored = self.inner.update(workspace).await?;
        self.writes
            .lock()
            .push(StoreWrite::Finalizers(stored.metadata.finalizers.clone()));
        Ok(stored)
    }

    async fn update_status(&self, workspace: &Workspace) -> Result<Workspace, StoreError> {
        let stored = self.inner.update_status(workspace).await?;
        self.writes
            .lock()
            .push(StoreWrite::Status(stored.status.clone()));
        Ok(stored)
    }

    async fn issue_token(
        &self,
        namespace: &str,
        service_account: &str,
        audience: &str,
        validity: Duration,
    ) -> Result<String, StoreError> {
        self.inner
            .issue_token(namespace, service_account, audience, validity)
            .await
    }
}

#[async_trait]
impl ReferenceStore for RecordingStore {
    async fn config_map(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ConfigData>, StoreError> {
        self.inner.config_map(namespace, name).await
    }

    async fn secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, StoreError> {
        self.inner.secret(namespace, name).await
    }
}

type TestReconciler = Reconciler<
    RecordingStore,
    FakeTerraformAdapter,
    FakeInstaller,
    FakeNotifyAdapter,
    FakeClock,
>;

struct TestContext {
    reconciler: TestReconciler,
    store: RecordingStore,
    memory: MemoryStore<FakeClock>,
    terraform: FakeTerraformAdapter,
    installer: FakeInstaller,
    notifier: FakeNotifyAdapter,
    clock: FakeClock,
    dir: TempDir,
}

impl TestContext {
    fn workspace_root(&self) -> PathBuf {
        self.dir.path().join("workspaces")
    }

    fn install_root(&self) -> PathBuf {
        self.dir.path().join("tools")
    }

    fn token_dir(&self) -> PathBuf {
        self.dir.path().join("tokens")
    }

    /// Store `ws` and return its id.
    fn create(&self, ws: Workspace) -> ResourceId {
        let id = ws.id();
        self.memory.apply(ws);
        id
    }

    fn stored(&self, id: &ResourceId) -> Workspace {
        self.memory.snapshot(id).unwrap()
    }

    async fn reconcile(&self, id: &ResourceId) -> Result<ReconcileOutcome, ReconcileError> {
        self.reconciler.reconcile(id).await
    }

    /// Run passes until one is neither a requeue nor an error.
    async fn converge(&self, id: &ResourceId) -> ReconcileOutcome {
        for _ in 0..4 {
            let outcome = self.reconcile(id).await.unwrap();
            if outcome != ReconcileOutcome::Requeue {
                return outcome;
            }
        }
        panic!("{id} did not converge");
    }
}

fn setup() -> TestContext {
    setup_with_refresh(None)
}

fn setup_with_refresh(refresh_interval: Option<Duration>) -> TestContext {
    let dir = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(dir.path().join("tokens")).unwrap();

    let clock = FakeClock::new();
    let memory = MemoryStore::with_clock(clock.clone());
    let store = RecordingStore {
        inner: memory.clone(),
        writes: Arc::new(Mutex::new(Vec::new())),
    };
    let terraform = FakeTerraformAdapter::new();
    let installer = FakeInstaller::new();
    let notifier = FakeNotifyAdapter::new();

    let reconciler = Reconciler::new(
        ReconcilerDeps {
            store: store.clone(),
            terraform: terraform.clone(),
            installer: installer.clone(),
            notifier: notifier.clone(),
        },
        ReconcilerConfig {
            workspace_root: dir.path().join("workspaces"),
            install_root: dir.path().join("tools"),
            token_dir: Some(dir.path().join("tokens")),
            refresh_interval,
        },
        clock.clone(),
    )
    .unwrap();

    TestContext {
        reconciler,
        store,
        memory,
        terraform,
        installer,
        notifier,
        clock,
        dir,
    }
}
