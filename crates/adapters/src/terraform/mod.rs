// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terraform process driver

mod cli;

pub use cli::CliTerraformAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeTerraformAdapter, TerraformCall};

use async_trait::async_trait;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::subprocess::SubprocessError;

/// File the plan is saved to inside the working directory.
pub const PLAN_FILE: &str = "plan.tfplan";

/// Terraform subcommands driven by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TerraformVerb {
    Init,
    Validate,
    Plan,
    Apply,
    Destroy,
    ShowPlan,
}

impl TerraformVerb {
    pub fn as_str(&self) -> &'static str {
        match self {
            TerraformVerb::Init => "init",
            TerraformVerb::Validate => "validate",
            TerraformVerb::Plan => "plan",
            TerraformVerb::Apply => "apply",
            TerraformVerb::Destroy => "destroy",
            TerraformVerb::ShowPlan => "show",
        }
    }
}

impl fmt::Display for TerraformVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from terraform invocations
#[derive(Debug, Error)]
pub enum TerraformError {
    /// Non-zero exit or diagnostics on stderr; holds the diagnostics verbatim
    #[error("terraform {verb} failed: {diagnostics}")]
    CommandFailed {
        verb: TerraformVerb,
        diagnostics: String,
    },
    #[error(transparent)]
    Spawn(#[from] SubprocessError),
    #[error("unexpected terraform {verb} output: {message}")]
    UnexpectedOutput {
        verb: TerraformVerb,
        message: String,
    },
}

/// A terraform executable bound to one working directory and environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerraformTarget {
    pub executable: PathBuf,
    pub working_dir: PathBuf,
    pub env: Vec<(String, String)>,
}

/// Resource changes counted by a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanSummary {
    pub add: u64,
    pub change: u64,
    pub remove: u64,
    pub import: u64,
}

impl PlanSummary {
    /// True when applying the plan would change infrastructure.
    pub fn has_changes(&self) -> bool {
        self.add + self.change + self.remove + self.import > 0
    }
}

/// Adapter for the terraform binary.
///
/// Calls block for the lifetime of the process; dropping the returned future
/// kills it.
#[async_trait]
pub trait TerraformAdapter: Clone + Send + Sync + 'static {
    /// `init -upgrade`
    async fn init(&self, target: &TerraformTarget) -> Result<(), TerraformError>;

    /// Returns whether the configuration is valid.
    async fn validate(&self, target: &TerraformTarget) -> Result<bool, TerraformError>;

    /// Plan into [`PLAN_FILE`] and report what would change.
    async fn plan(&self, target: &TerraformTarget) -> Result<PlanSummary, TerraformError>;

    /// Apply the saved plan. Returns the machine-readable output.
    async fn apply(&self, target: &TerraformTarget) -> Result<String, TerraformError>;

    /// Destroy everything the working directory manages.
    async fn destroy(&self, target: &TerraformTarget) -> Result<String, TerraformError>;

    /// The saved plan rendered as JSON.
    async fn show_plan(&self, target: &TerraformTarget) -> Result<String, TerraformError>;
}
