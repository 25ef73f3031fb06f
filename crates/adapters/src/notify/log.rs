// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Notifications as structured log events.

use super::{NotifyAdapter, NotifyError};
use async_trait::async_trait;
use krec_core::{Notification, NotificationType};

/// Emits each notification as a tracing event under the `krec::notify` target.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifyAdapter;

impl LogNotifyAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotifyAdapter for LogNotifyAdapter {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
        let reason = notification.kind.reason();
        match notification.kind.notification_type() {
            NotificationType::Normal => tracing::info!(
                target: "krec::notify",
                resource = %notification.resource,
                reason,
                message = notification.message.as_str(),
                "notification"
            ),
            NotificationType::Warning => tracing::warn!(
                target: "krec::notify",
                resource = %notification.resource,
                reason,
                message = notification.message.as_str(),
                "notification"
            ),
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "log_tests.rs"]
mod tests;
