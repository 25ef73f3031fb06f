// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
// Enable coverage(off) attribute for excluding test infrastructure
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! Adapters for external I/O: the resource store, the terraform binary,
//! release downloads and notifications

pub mod installer;
pub mod notify;
pub mod store;
pub mod subprocess;
pub mod terraform;
pub mod traced;

pub use installer::{InstallerError, ReleasesInstaller, ToolInstaller};
pub use notify::{LogNotifyAdapter, NotifyAdapter, NotifyError};
pub use store::{ConfigData, ReferenceStore, SecretData, StoreError, WorkspaceStore};
pub use terraform::{
    CliTerraformAdapter, PlanSummary, TerraformAdapter, TerraformError, TerraformTarget,
    TerraformVerb,
};
pub use traced::{TracedInstaller, TracedTerraform};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
pub use installer::FakeInstaller;
#[cfg(any(test, feature = "test-support"))]
pub use notify::FakeNotifyAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use terraform::{FakeTerraformAdapter, TerraformCall};
