// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use krec_core::{NotificationKind, ResourceId};

#[tokio::test]
async fn log_notify_never_fails() {
    let adapter = LogNotifyAdapter::new();
    for kind in [
        NotificationKind::TerraformError,
        NotificationKind::Planned,
        NotificationKind::Applied,
        NotificationKind::Destroyed,
    ] {
        let n = Notification::new(ResourceId::new("default", "ws"), kind, "msg");
        assert!(adapter.notify(&n).await.is_ok());
    }
}
