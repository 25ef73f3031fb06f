// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! krec-core: resource model shared by the Terraform workspace reconciler

pub mod clock;
pub mod notification;
pub mod resource;
pub mod workspace;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use clock::{Clock, FakeClock, SystemClock};
pub use notification::{Notification, NotificationKind, NotificationType};
pub use resource::{ObjectMeta, ResourceId, DEFAULT_NAMESPACE};
pub use workspace::{
    AuthenticationSpec, AwsAuth, BackendSpec, EnvVar, EnvVarSource, KeySelector, Lifecycle,
    ModuleOutput, ModuleSpec, ProviderSpec, RawJson, Workspace, WorkspaceSpec, WorkspaceStatus,
    WORKSPACE_FINALIZER,
};
