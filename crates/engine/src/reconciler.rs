// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace reconciliation state machine
//!
//! One pass runs the steps strictly in order:
//! fetch, environment, tool, render, init, validate, then either destroy (when
//! deleting) or finalizer, plan and optional apply. Status fields are written
//! as each step completes, so a failed pass leaves the status describing the
//! last completed step. No step is retried here; errors go back to the caller
//! tagged with the step and resource.

use crate::env_resolver::{EnvResolver, ResolvedEnv};
use crate::error::{ReconcileError, Step, StepError};
use crate::tool_cache::ToolCache;
use crate::workdir::{WorkDir, WorkDirs, WorkdirError};
use krec_adapters::{
    NotifyAdapter, PlanSummary, ReferenceStore, TerraformAdapter, TerraformError,
    TerraformTarget, ToolInstaller, WorkspaceStore,
};
use krec_core::{
    Clock, Lifecycle, Notification, NotificationKind, ResourceId, Workspace, WORKSPACE_FINALIZER,
};
use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Variable pointing terraform at the shared provider cache.
pub const PLUGIN_CACHE_VAR: &str = "TF_PLUGIN_CACHE_DIR";

/// Adapter dependencies
pub struct ReconcilerDeps<S, T, I, N> {
    pub store: S,
    pub terraform: T,
    pub installer: I,
    pub notifier: N,
}

/// Paths and policy
#[derive(Debug, Clone)]
pub struct ReconcilerConfig {
    /// Root of the per-workspace working directories
    pub workspace_root: PathBuf,
    /// Root of versioned terraform installs and the plugin cache
    pub install_root: PathBuf,
    /// Where credential files are created; the system temp dir when unset
    pub token_dir: Option<PathBuf>,
    /// Re-plan a processed workspace after this long; never when unset
    pub refresh_interval: Option<Duration>,
}

/// Result of a successful pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The workspace does not exist
    NotFound,
    /// The current generation was already processed
    UpToDate,
    /// The finalizer was just recorded; run again to plan
    Requeue,
    /// Planned (and applied when requested) the current generation
    Done,
    /// Infrastructure destroyed and the finalizer released
    Deleted,
}

impl fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReconcileOutcome::NotFound => "not-found",
            ReconcileOutcome::UpToDate => "up-to-date",
            ReconcileOutcome::Requeue => "requeue",
            ReconcileOutcome::Done => "done",
            ReconcileOutcome::Deleted => "deleted",
        };
        f.write_str(s)
    }
}

/// Drives workspaces through the terraform lifecycle
pub struct Reconciler<S, T, I, N, C: Clock> {
    store: S,
    terraform: T,
    notifier: N,
    tools: ToolCache<I>,
    env: EnvResolver<S>,
    workdirs: WorkDirs,
    clock: C,
    refresh_interval: Option<Duration>,
}

fn at<E: Into<StepError>>(id: &ResourceId, step: Step) -> impl FnOnce(E) -> ReconcileError + '_ {
    move |e| ReconcileError::new(id.clone(), step, e)
}

impl<S, T, I, N, C> Reconciler<S, T, I, N, C>
where
    S: WorkspaceStore + ReferenceStore,
    T: TerraformAdapter,
    I: ToolInstaller,
    N: NotifyAdapter,
    C: Clock,
{
    pub fn new(
        deps: ReconcilerDeps<S, T, I, N>,
        config: ReconcilerConfig,
        clock: C,
    ) -> Result<Self, WorkdirError> {
        let mut env = EnvResolver::new(deps.store.clone());
        if let Some(dir) = config.token_dir {
            env = env.with_token_dir(dir);
        }
        Ok(Self {
            store: deps.store,
            terraform: deps.terraform,
            notifier: deps.notifier,
            tools: ToolCache::new(deps.installer, config.install_root),
            env,
            workdirs: WorkDirs::new(config.workspace_root)?,
            clock,
            refresh_interval: config.refresh_interval,
        })
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn tools(&self) -> &ToolCache<I> {
        &self.tools
    }

    pub fn workdirs(&self) -> &WorkDirs {
        &self.workdirs
    }

    /// Run one pass for `id`.
    pub async fn reconcile(&self, id: &ResourceId) -> Result<ReconcileOutcome, ReconcileError> {
        let span = tracing::info_span!("reconcile", resource = %id);
        let start = Instant::now();
        let result = self.reconcile_inner(id).instrument(span.clone()).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        span.in_scope(|| match &result {
            Ok(outcome) => tracing::info!(elapsed_ms, %outcome, "reconciled"),
            Err(e) => tracing::error!(elapsed_ms, step = %e.step, error = %e.source, "reconcile failed"),
        });
        result
    }

    async fn reconcile_inner(&self, id: &ResourceId) -> Result<ReconcileOutcome, ReconcileError> {
        let Some(mut ws) = self.store.get(id).await.map_err(at(id, Step::Fetch))? else {
            tracing::debug!("workspace not found, nothing to do");
            return Ok(ReconcileOutcome::NotFound);
        };

        match ws.lifecycle() {
            Lifecycle::Deleting { finalized: false } => {
                tracing::debug!("deleting without finalizer, nothing to destroy");
                return Ok(ReconcileOutcome::Deleted);
            }
            Lifecycle::Live if ws.is_up_to_date(self.clock.epoch_ms()) => {
                tracing::debug!(generation = ws.metadata.generation, "already processed");
                return Ok(ReconcileOutcome::UpToDate);
            }
            _ => {}
        }

        // Owns the credential file until the pass ends.
        let env = self
            .env
            .resolve(&ws)
            .await
            .map_err(at(id, Step::Environment))?;

        let executable = self
            .tools
            .acquire(&ws.spec.terraform_version)
            .await
            .map_err(at(id, Step::ToolAcquire))?;
        let plugin_cache = self
            .tools
            .prepare_plugin_cache()
            .map_err(at(id, Step::ToolAcquire))?;
        let workdir = self
            .workdirs
            .prepare(id, ws.spec.tf_rc.as_deref())
            .map_err(at(id, Step::WorkingDir))?;

        let document = krec_render::render(&ws.spec).map_err(at(id, Step::Render))?;
        krec_render::write_document(&workdir.path, &document).map_err(at(id, Step::Render))?;
        ws.status.current_render = document;
        ws = self.persist_status(&ws).await?;

        let target = TerraformTarget {
            executable,
            working_dir: workdir.path.clone(),
            env: target_env(&env, &workdir, &plugin_cache),
        };

        {
            let _plugins = self.tools.init_lock().await;
            self.run(id, Step::Init, self.terraform.init(&target))
                .await?;
        }
        let valid = self
            .run(id, Step::Validate, self.terraform.validate(&target))
            .await?;
        ws.status.valid_render = valid;
        ws = self.persist_status(&ws).await?;
        if !valid {
            self.notify(id, NotificationKind::TerraformError, "configuration is invalid")
                .await;
            return Err(ReconcileError::new(
                id.clone(),
                Step::Validate,
                StepError::InvalidConfiguration,
            ));
        }

        if ws.metadata.is_deleting() {
            return self.destroy(ws, &target).await;
        }

        if !ws.has_finalizer() {
            ws.metadata.add_finalizer(WORKSPACE_FINALIZER);
            self.store
                .update(&ws)
                .await
                .map_err(at(id, Step::Finalizer))?;
            tracing::info!("finalizer added");
            return Ok(ReconcileOutcome::Requeue);
        }

        let summary = self
            .run(id, Step::Plan, self.terraform.plan(&target))
            .await?;
        let plan = self
            .run(id, Step::Plan, self.terraform.show_plan(&target))
            .await?;
        ws.status.latest_plan = plan;
        ws.status.plan_has_changes = summary.has_changes();
        ws = self.persist_status(&ws).await?;
        self.notify(id, NotificationKind::Planned, plan_message(&summary))
            .await;

        if ws.spec.auto_apply && summary.has_changes() {
            self.run(id, Step::Apply, self.terraform.apply(&target))
                .await?;
            self.notify(id, NotificationKind::Applied, "apply complete")
                .await;
        }

        ws.status.observed_generation = ws.metadata.generation;
        ws.status.next_refresh_timestamp_ms = self
            .refresh_interval
            .map(|interval| {
                let millis = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
                self.clock.epoch_ms().saturating_add(millis)
            });
        self.persist_status(&ws).await?;
        Ok(ReconcileOutcome::Done)
    }

    /// Destroy, record the generation, then release the finalizer. Releasing
    /// the last finalizer deletes the object, so the status write comes first.
    async fn destroy(
        &self,
        mut ws: Workspace,
        target: &TerraformTarget,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        let id = ws.id();
        self.run(&id, Step::Destroy, self.terraform.destroy(target))
            .await?;
        self.notify(&id, NotificationKind::Destroyed, "destroy complete")
            .await;

        ws.status.observed_generation = ws.metadata.generation;
        ws.status.next_refresh_timestamp_ms = None;
        let mut ws = self.persist_status(&ws).await?;
        ws.metadata.remove_finalizer(WORKSPACE_FINALIZER);
        self.store
            .update(&ws)
            .await
            .map_err(at(&id, Step::Finalizer))?;
        tracing::info!("finalizer removed");

        if let Err(e) = self.workdirs.remove(&id) {
            tracing::warn!(error = %e, "failed to remove working directory");
        }
        Ok(ReconcileOutcome::Deleted)
    }

    async fn persist_status(&self, ws: &Workspace) -> Result<Workspace, ReconcileError> {
        self.store
            .update_status(ws)
            .await
            .map_err(|e| ReconcileError::new(ws.id(), Step::Status, e))
    }

    /// Await a terraform call, reporting a failure before returning it.
    async fn run<R>(
        &self,
        id: &ResourceId,
        step: Step,
        call: impl Future<Output = Result<R, TerraformError>>,
    ) -> Result<R, ReconcileError> {
        match call.await {
            Ok(value) => Ok(value),
            Err(e) => {
                self.notify(id, NotificationKind::TerraformError, e.to_string())
                    .await;
                Err(ReconcileError::new(id.clone(), step, e))
            }
        }
    }

    async fn notify(&self, id: &ResourceId, kind: NotificationKind, message: impl Into<String>) {
        let notification = Notification::new(id.clone(), kind, message);
        if let Err(e) = self.notifier.notify(&notification).await {
            tracing::warn!(error = %e, reason = kind.reason(), "notification failed");
        }
    }
}

/// Workspace variables first, then the variables the engine manages, which
/// replace any workspace value of the same name.
fn target_env(env: &ResolvedEnv, workdir: &WorkDir, plugin_cache: &Path) -> Vec<(String, String)> {
    let mut managed = workdir.env();
    managed.push((
        PLUGIN_CACHE_VAR.to_string(),
        plugin_cache.display().to_string(),
    ));

    let mut vars: Vec<(String, String)> = env
        .vars()
        .iter()
        .filter(|(k, _)| !managed.iter().any(|(m, _)| m == k))
        .cloned()
        .collect();
    vars.extend(managed);
    vars
}

fn plan_message(summary: &PlanSummary) -> String {
    format!(
        "Plan: {} to add, {} to change, {} to destroy.",
        summary.add, summary.change, summary.remove
    )
}

#[cfg(test)]
#[path = "reconciler_tests/mod.rs"]
mod tests;
