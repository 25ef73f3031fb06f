// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::installer::{InstallerError, ToolInstaller};
use crate::terraform::{
    PlanSummary, TerraformAdapter, TerraformError, TerraformTarget, TerraformVerb,
};
use async_trait::async_trait;
use std::future::Future;
use std::path::{Path, PathBuf};
use tracing::Instrument;

/// Wrapper that adds tracing to any TerraformAdapter
#[derive(Clone)]
pub struct TracedTerraform<T> {
    inner: T,
}

impl<T> TracedTerraform<T> {
    pub fn new(inner: T) -> Self {
        Self { inner }
    }
}

/// Run one terraform call inside a `terraform.<verb>` span with timing.
async fn traced_call<R, F>(
    verb: TerraformVerb,
    target: &TerraformTarget,
    call: F,
) -> Result<R, TerraformError>
where
    F: Future<Output = Result<R, TerraformError>>,
{
    let span = tracing::info_span!(
        "terraform",
        verb = verb.as_str(),
        dir = %target.working_dir.display(),
    );
    async {
        tracing::info!(env_count = target.env.len(), "starting");
        let start = std::time::Instant::now();
        let result = call.await;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        match &result {
            Ok(_) => tracing::info!(elapsed_ms, "terraform {} finished", verb),
            Err(e) => tracing::error!(elapsed_ms, error = %e, "terraform {} failed", verb),
        }
        result
    }
    .instrument(span)
    .await
}

#[async_trait]
impl<T: TerraformAdapter> TerraformAdapter for TracedTerraform<T> {
    async fn init(&self, target: &TerraformTarget) -> Result<(), TerraformError> {
        traced_call(TerraformVerb::Init, target, self.inner.init(target)).await
    }

    async fn validate(&self, target: &TerraformTarget) -> Result<bool, TerraformError> {
        let result =
            traced_call(TerraformVerb::Validate, target, self.inner.validate(target)).await;
        if let Ok(false) = result {
            tracing::warn!(dir = %target.working_dir.display(), "configuration is not valid");
        }
        result
    }

    async fn plan(&self, target: &TerraformTarget) -> Result<PlanSummary, TerraformError> {
        let result = traced_call(TerraformVerb::Plan, target, self.inner.plan(target)).await;
        if let Ok(summary) = &result {
            tracing::info!(
                add = summary.add,
                change = summary.change,
                remove = summary.remove,
                import = summary.import,
                "plan summary"
            );
        }
        result
    }

    async fn apply(&self, target: &TerraformTarget) -> Result<String, TerraformError> {
        traced_call(TerraformVerb::Apply, target, self.inner.apply(target)).await
    }

    async fn destroy(&self, target: &TerraformTarget) -> Result<String, TerraformError> {
        traced_call(TerraformVerb::Destroy, target, self.inner.destroy(target)).await
    }

    async fn show_plan(&self, target: &TerraformTarget) -> Result<String, TerraformError> {
        let result =
            traced_call(TerraformVerb::ShowPlan, target, self.inner.show_plan(target)).await;
        tracing::trace!(plan_len = result.as_ref().map(|s| s.len()).ok(), "plan shown");
        result
    }
}

/// Wrapper that adds tracing to any ToolInstaller
#[derive(Clone)]
pub struct TracedInstaller<I> {
    inner: I,
}

impl<I> TracedInstaller<I> {
    pub fn new(inner: I) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<I: ToolInstaller> ToolInstaller for TracedInstaller<I> {
    async fn install(&self, version: &str, dir: &Path) -> Result<PathBuf, InstallerError> {
        async {
            tracing::info!("installing");
            let start = std::time::Instant::now();
            let result = self.inner.install(version, dir).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(path) => tracing::info!(path = %path.display(), elapsed_ms, "terraform installed"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "install failed"),
            }
            result
        }
        .instrument(tracing::info_span!("installer.install", version, dir = %dir.display()))
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
