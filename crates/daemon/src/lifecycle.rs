// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, manifest sync, shutdown.

use std::fs::File;
use std::io::Write;

use fs2::FileExt;
use krec_adapters::{
    CliTerraformAdapter, LogNotifyAdapter, ReleasesInstaller, StoreError, TracedInstaller,
    TracedTerraform,
};
use krec_core::SystemClock;
use krec_engine::{Controller, Reconciler, ReconcilerConfig, ReconcilerDeps, WorkdirError};
use krec_storage::{FsStore, SyncReport};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;

pub type DaemonStore = FsStore<SystemClock>;
pub type DaemonTerraform = TracedTerraform<CliTerraformAdapter>;
pub type DaemonInstaller = TracedInstaller<ReleasesInstaller>;

/// Reconciler with concrete adapter types (wrapped with tracing)
pub type DaemonReconciler =
    Reconciler<DaemonStore, DaemonTerraform, DaemonInstaller, LogNotifyAdapter, SystemClock>;

pub type DaemonController =
    Controller<DaemonStore, DaemonTerraform, DaemonInstaller, LogNotifyAdapter, SystemClock>;

/// Daemon state during operation.
pub struct DaemonState {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub store: DaemonStore,
    pub controller: DaemonController,
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("workspace root: {0}")]
    Workdir(#[from] WorkdirError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DaemonState {
    /// Pull the manifests directory into the store and queue pending work.
    pub async fn sync_manifests(&self) -> Result<SyncReport, LifecycleError> {
        let report = self.store.sync_manifests()?;
        if !report.is_empty() {
            info!(
                created = report.created,
                updated = report.updated,
                deleted = report.deleted,
                invalid = report.invalid.len(),
                "manifests synced"
            );
        }
        for path in &report.invalid {
            warn!(path = %path.display(), "skipped invalid manifest");
        }
        self.controller.enqueue_pending().await;
        Ok(report)
    }

    pub fn shutdown(&self) -> Result<(), LifecycleError> {
        info!("shutting down daemon");

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!(error = %e, "failed to remove PID file");
            }
        }

        // Lock file is released when self.lock_file is dropped
        info!("daemon shutdown complete");
        Ok(())
    }
}

/// Start the daemon
pub async fn startup(config: &Config) -> Result<DaemonState, LifecycleError> {
    match startup_inner(config).await {
        Ok(state) => Ok(state),
        Err(e) => {
            // The lock and its PID belong to the running daemon
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

async fn startup_inner(config: &Config) -> Result<DaemonState, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;

    let mut lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file
        .try_lock_exclusive()
        .map_err(LifecycleError::LockFailed)?;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;

    for dir in [
        &config.manifests_path,
        &config.workspace_path,
        &config.install_path,
        &config.token_path,
    ] {
        std::fs::create_dir_all(dir)?;
    }

    let store = FsStore::open(&config.state_dir, &config.manifests_path)?;
    let reconciler = Reconciler::new(
        ReconcilerDeps {
            store: store.clone(),
            terraform: TracedTerraform::new(CliTerraformAdapter::with_timeout(
                config.terraform_timeout,
            )),
            installer: TracedInstaller::new(ReleasesInstaller::new(config.releases_url.clone())),
            notifier: LogNotifyAdapter::new(),
        },
        ReconcilerConfig {
            workspace_root: config.workspace_path.clone(),
            install_root: config.install_path.clone(),
            token_dir: Some(config.token_path.clone()),
            refresh_interval: config.refresh_interval,
        },
        SystemClock,
    )?;
    let controller = Controller::new(reconciler, store.clone(), config.controller());

    let state = DaemonState {
        config: config.clone(),
        lock_file,
        store,
        controller,
    };
    state.sync_manifests().await?;

    info!(
        state_dir = %config.state_dir.display(),
        manifests = %config.manifests_path.display(),
        workers = config.max_concurrent_reconciles,
        "daemon started"
    );
    Ok(state)
}

fn cleanup_on_failure(config: &Config) {
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
