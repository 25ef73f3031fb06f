// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terraform CLI adapter

use super::{
    PlanSummary, TerraformAdapter, TerraformError, TerraformTarget, TerraformVerb, PLAN_FILE,
};
use crate::subprocess::{run_bounded, TERRAFORM_TIMEOUT};
use async_trait::async_trait;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Runs the terraform binary as a subprocess with `-no-color -json` output.
#[derive(Clone, Debug)]
pub struct CliTerraformAdapter {
    timeout: Duration,
}

impl Default for CliTerraformAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl CliTerraformAdapter {
    pub fn new() -> Self {
        Self {
            timeout: TERRAFORM_TIMEOUT,
        }
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn exec(
        &self,
        target: &TerraformTarget,
        verb: TerraformVerb,
        args: &[&str],
    ) -> Result<Output, TerraformError> {
        let mut cmd = Command::new(&target.executable);
        cmd.arg(format!("-chdir={}", target.working_dir.display()))
            .arg(verb.as_str())
            .args(["-no-color", "-json"])
            .args(args)
            .env("TF_IN_AUTOMATION", "1")
            .envs(target.env.iter().map(|(k, v)| (k.as_str(), v.as_str())));

        let description = format!("terraform {}", verb);
        Ok(run_bounded(cmd, self.timeout, &description).await?)
    }

    async fn run(
        &self,
        target: &TerraformTarget,
        verb: TerraformVerb,
        args: &[&str],
    ) -> Result<String, TerraformError> {
        let output = self.exec(target, verb, args).await?;
        check_output(verb, output)
    }
}

/// Fail on a non-zero exit or any stderr output.
fn check_output(verb: TerraformVerb, output: Output) -> Result<String, TerraformError> {
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !output.status.success() || !stderr.trim().is_empty() {
        let diagnostics = if stderr.trim().is_empty() {
            stdout
        } else {
            stderr.into_owned()
        };
        return Err(TerraformError::CommandFailed { verb, diagnostics });
    }
    Ok(stdout)
}

/// Find the `change_summary` message in a `-json` plan stream.
pub(crate) fn parse_change_summary(stream: &str) -> Option<PlanSummary> {
    stream
        .lines()
        .filter_map(|line| serde_json::from_str::<serde_json::Value>(line).ok())
        .filter(|msg| msg.get("type").and_then(|t| t.as_str()) == Some("change_summary"))
        .filter_map(|msg| msg.get("changes").cloned())
        .map(|changes| {
            let count = |key: &str| changes.get(key).and_then(|v| v.as_u64()).unwrap_or(0);
            PlanSummary {
                add: count("add"),
                change: count("change"),
                remove: count("remove"),
                import: count("import"),
            }
        })
        .last()
}

/// Read `valid` from `validate -json` output.
pub(crate) fn parse_validity(output: &str) -> Option<bool> {
    serde_json::from_str::<serde_json::Value>(output)
        .ok()?
        .get("valid")?
        .as_bool()
}

#[async_trait]
impl TerraformAdapter for CliTerraformAdapter {
    async fn init(&self, target: &TerraformTarget) -> Result<(), TerraformError> {
        self.run(target, TerraformVerb::Init, &["-upgrade", "-input=false"])
            .await
            .map(|_| ())
    }

    async fn validate(&self, target: &TerraformTarget) -> Result<bool, TerraformError> {
        let verb = TerraformVerb::Validate;
        let output = self.exec(target, verb, &[]).await?;
        // An invalid configuration exits 1 with its diagnostics as JSON on stdout
        if output.status.code() == Some(1) {
            if let Some(valid) = parse_validity(&String::from_utf8_lossy(&output.stdout)) {
                return Ok(valid);
            }
        }
        let stdout = check_output(verb, output)?;
        parse_validity(&stdout).ok_or_else(|| TerraformError::UnexpectedOutput {
            verb,
            message: "missing \"valid\" field".to_string(),
        })
    }

    async fn plan(&self, target: &TerraformTarget) -> Result<PlanSummary, TerraformError> {
        let verb = TerraformVerb::Plan;
        let out = format!("-out={}", PLAN_FILE);
        let output = self.run(target, verb, &["-input=false", &out]).await?;
        parse_change_summary(&output).ok_or_else(|| TerraformError::UnexpectedOutput {
            verb,
            message: "no change_summary message in plan output".to_string(),
        })
    }

    async fn apply(&self, target: &TerraformTarget) -> Result<String, TerraformError> {
        self.run(target, TerraformVerb::Apply, &["-input=false", PLAN_FILE])
            .await
    }

    async fn destroy(&self, target: &TerraformTarget) -> Result<String, TerraformError> {
        self.run(
            target,
            TerraformVerb::Destroy,
            &["-auto-approve", "-input=false"],
        )
        .await
    }

    async fn show_plan(&self, target: &TerraformTarget) -> Result<String, TerraformError> {
        self.run(target, TerraformVerb::ShowPlan, &[PLAN_FILE]).await
    }
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
