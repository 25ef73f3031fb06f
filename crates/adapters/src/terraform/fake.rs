// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake terraform adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{PlanSummary, TerraformAdapter, TerraformError, TerraformTarget, TerraformVerb};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Env var naming the federated token file; its contents are captured per call.
const TOKEN_FILE_VAR: &str = "AWS_WEB_IDENTITY_TOKEN_FILE";

/// Recorded terraform invocation
#[derive(Debug, Clone)]
pub struct TerraformCall {
    pub verb: TerraformVerb,
    pub executable: PathBuf,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
    /// Contents of the federated token file at call time, if one was passed
    pub token_file_contents: Option<String>,
}

impl TerraformCall {
    pub fn env_value(&self, name: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

struct FakeTerraformState {
    calls: Vec<TerraformCall>,
    failures: HashMap<TerraformVerb, String>,
    plan: PlanSummary,
    valid: bool,
    delay: Option<Duration>,
}

/// Fake terraform adapter for testing
#[derive(Clone)]
pub struct FakeTerraformAdapter {
    inner: Arc<Mutex<FakeTerraformState>>,
}

impl Default for FakeTerraformAdapter {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeTerraformState {
                calls: Vec::new(),
                failures: HashMap::new(),
                plan: PlanSummary::default(),
                valid: true,
                delay: None,
            })),
        }
    }
}

impl FakeTerraformAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<TerraformCall> {
        self.inner.lock().calls.clone()
    }

    /// Verbs in call order
    pub fn verbs(&self) -> Vec<TerraformVerb> {
        self.inner.lock().calls.iter().map(|c| c.verb).collect()
    }

    pub fn count(&self, verb: TerraformVerb) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| c.verb == verb)
            .count()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    /// Make every call of `verb` fail with `diagnostics` until cleared
    pub fn fail(&self, verb: TerraformVerb, diagnostics: &str) {
        self.inner
            .lock()
            .failures
            .insert(verb, diagnostics.to_string());
    }

    pub fn clear_failure(&self, verb: TerraformVerb) {
        self.inner.lock().failures.remove(&verb);
    }

    /// Summary returned by subsequent plans
    pub fn set_plan(&self, plan: PlanSummary) {
        self.inner.lock().plan = plan;
    }

    /// Shorthand for a plan that adds `n` resources
    pub fn set_plan_adds(&self, n: u64) {
        self.set_plan(PlanSummary {
            add: n,
            ..PlanSummary::default()
        });
    }

    pub fn set_valid(&self, valid: bool) {
        self.inner.lock().valid = valid;
    }

    /// Hold every call for `delay` before answering
    pub fn set_delay(&self, delay: Duration) {
        self.inner.lock().delay = Some(delay);
    }

    async fn record(
        &self,
        verb: TerraformVerb,
        target: &TerraformTarget,
    ) -> Result<(), TerraformError> {
        let token_file_contents = target
            .env
            .iter()
            .find(|(k, _)| k == TOKEN_FILE_VAR)
            .and_then(|(_, path)| std::fs::read_to_string(path).ok());

        let delay = {
            let mut inner = self.inner.lock();
            inner.calls.push(TerraformCall {
                verb,
                executable: target.executable.clone(),
                working_dir: target.working_dir.clone(),
                env: target.env.clone(),
                token_file_contents,
            });
            inner.delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        match self.inner.lock().failures.get(&verb) {
            Some(diagnostics) => Err(TerraformError::CommandFailed {
                verb,
                diagnostics: diagnostics.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl TerraformAdapter for FakeTerraformAdapter {
    async fn init(&self, target: &TerraformTarget) -> Result<(), TerraformError> {
        self.record(TerraformVerb::Init, target).await
    }

    async fn validate(&self, target: &TerraformTarget) -> Result<bool, TerraformError> {
        self.record(TerraformVerb::Validate, target).await?;
        Ok(self.inner.lock().valid)
    }

    async fn plan(&self, target: &TerraformTarget) -> Result<PlanSummary, TerraformError> {
        self.record(TerraformVerb::Plan, target).await?;
        Ok(self.inner.lock().plan)
    }

    async fn apply(&self, target: &TerraformTarget) -> Result<String, TerraformError> {
        self.record(TerraformVerb::Apply, target).await?;
        Ok(r#"{"type":"apply_complete"}"#.to_string())
    }

    async fn destroy(&self, target: &TerraformTarget) -> Result<String, TerraformError> {
        self.record(TerraformVerb::Destroy, target).await?;
        Ok(r#"{"type":"apply_complete","operation":"delete"}"#.to_string())
    }

    async fn show_plan(&self, target: &TerraformTarget) -> Result<String, TerraformError> {
        self.record(TerraformVerb::ShowPlan, target).await?;
        let plan = self.inner.lock().plan;
        Ok(serde_json::json!({
            "format_version": "1.2",
            "resource_changes_count": plan.add + plan.change + plan.remove + plan.import,
        })
        .to_string())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
