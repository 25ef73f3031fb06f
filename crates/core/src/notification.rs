// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notifications emitted for external observability.

use crate::resource::ResourceId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationType {
    Normal,
    Warning,
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    TerraformError,
    Planned,
    Applied,
    Destroyed,
}

impl NotificationKind {
    /// Short reason string, stable for consumers.
    pub fn reason(&self) -> &'static str {
        match self {
            NotificationKind::TerraformError => "TerraformError",
            NotificationKind::Planned => "TerraformPlan",
            NotificationKind::Applied => "TerraformApply",
            NotificationKind::Destroyed => "TerraformDestroy",
        }
    }

    pub fn notification_type(&self) -> NotificationType {
        match self {
            NotificationKind::TerraformError => NotificationType::Warning,
            _ => NotificationType::Normal,
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.reason())
    }
}

/// A typed event attached to a resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub resource: ResourceId,
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn new(resource: ResourceId, kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            resource,
            kind,
            message: message.into(),
        }
    }
}
