// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for the reconciler

use crate::env_resolver::EnvError;
use crate::tool_cache::InstallError;
use crate::workdir::WorkdirError;
use krec_adapters::{StoreError, TerraformError};
use krec_core::ResourceId;
use krec_render::RenderError;
use std::fmt;
use thiserror::Error;

/// Step of a reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Fetch,
    Environment,
    ToolAcquire,
    WorkingDir,
    Render,
    Init,
    Validate,
    Destroy,
    Finalizer,
    Plan,
    Apply,
    Status,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Fetch => "fetch",
            Step::Environment => "environment",
            Step::ToolAcquire => "tool-acquire",
            Step::WorkingDir => "working-dir",
            Step::Render => "render",
            Step::Init => "init",
            Step::Validate => "validate",
            Step::Destroy => "destroy",
            Step::Finalizer => "finalizer",
            Step::Plan => "plan",
            Step::Apply => "apply",
            Step::Status => "status",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What went wrong inside a step
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Environment(#[from] EnvError),
    #[error(transparent)]
    Install(#[from] InstallError),
    #[error(transparent)]
    WorkingDir(#[from] WorkdirError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error(transparent)]
    Terraform(#[from] TerraformError),
    #[error("configuration is invalid")]
    InvalidConfiguration,
}

/// A failed reconciliation pass
#[derive(Debug, Error)]
#[error("reconcile {resource} failed at {step}: {source}")]
pub struct ReconcileError {
    pub resource: ResourceId,
    pub step: Step,
    #[source]
    pub source: StepError,
}

impl ReconcileError {
    pub fn new(resource: ResourceId, step: Step, source: impl Into<StepError>) -> Self {
        Self {
            resource,
            step,
            source: source.into(),
        }
    }
}
