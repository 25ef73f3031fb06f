// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Reconciliation engine: executable cache, environment resolution, the
//! per-workspace state machine and the controller that schedules it

pub mod controller;
pub mod env_resolver;
mod error;
pub mod reconciler;
pub mod tool_cache;
pub mod workdir;

pub use controller::{backoff_delay, needs_work, Controller, ControllerConfig, WorkQueue};
pub use env_resolver::{EnvError, EnvResolver, ReferenceKind, ResolvedEnv};
pub use error::{ReconcileError, Step, StepError};
pub use reconciler::{ReconcileOutcome, Reconciler, ReconcilerConfig, ReconcilerDeps};
pub use tool_cache::{InstallError, ToolCache, PLUGIN_CACHE_DIR};
pub use workdir::{WorkDir, WorkDirs, WorkdirError};
