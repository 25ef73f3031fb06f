// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Step failures: tagging, notifications and partial status

use super::*;
use crate::tool_cache::InstallError;

#[tokio::test]
async fn malformed_inputs_fail_before_terraform_runs() {
    let ctx = setup();
    let id = ctx.create(
        WorkspaceBuilder::new("default", "vpc")
            .module_inputs(r#"{"cidr": "#)
            .build(),
    );

    let err = ctx.reconcile(&id).await.unwrap_err();

    assert_eq!(err.step, Step::Render);
    assert!(matches!(err.source, StepError::Render(_)));
    assert!(ctx.terraform.calls().is_empty());
    assert!(ctx.store.writes().is_empty());
}

#[tokio::test]
async fn install_failure_is_retried_on_the_next_pass() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.installer.fail_next(1);

    let err = ctx.reconcile(&id).await.unwrap_err();
    assert_eq!(err.step, Step::ToolAcquire);
    assert!(matches!(
        err.source,
        StepError::Install(InstallError::Failed { .. })
    ));
    assert!(ctx.terraform.calls().is_empty());

    assert_eq!(ctx.reconcile(&id).await.unwrap(), ReconcileOutcome::Requeue);
    assert_eq!(ctx.installer.install_count(), 2);
}

#[tokio::test]
async fn unsafe_version_is_rejected() {
    let ctx = setup();
    let id = ctx.create(
        WorkspaceBuilder::new("default", "vpc")
            .terraform_version("../../bin")
            .build(),
    );

    let err = ctx.reconcile(&id).await.unwrap_err();

    assert!(matches!(
        err.source,
        StepError::Install(InstallError::InvalidVersion(_))
    ));
    assert_eq!(ctx.installer.install_count(), 0);
}

#[tokio::test]
async fn init_failure_is_reported_with_diagnostics() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.terraform.fail(
        TerraformVerb::Init,
        "Error: Failed to query available provider packages",
    );

    let err = ctx.reconcile(&id).await.unwrap_err();

    assert_eq!(err.step, Step::Init);
    assert!(err.to_string().contains("default/vpc"));
    assert!(err.to_string().contains("Failed to query available provider packages"));
    let notes = ctx.notifier.calls();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].kind, NotificationKind::TerraformError);
    assert_eq!(notes[0].resource, id);
}

#[tokio::test]
async fn render_is_recorded_even_when_a_later_step_fails() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.reconcile(&id).await.unwrap();
    ctx.terraform.fail(TerraformVerb::Plan, "Error: Invalid provider configuration");

    let err = ctx.reconcile(&id).await.unwrap_err();

    assert_eq!(err.step, Step::Plan);
    let stored = ctx.stored(&id);
    assert!(!stored.status.current_render.is_empty());
    assert!(stored.status.valid_render);
    assert_eq!(stored.status.observed_generation, 0);
    assert_eq!(ctx.notifier.kinds(), vec![NotificationKind::TerraformError]);
}

#[tokio::test]
async fn invalid_configuration_stops_the_pass() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.terraform.set_valid(false);

    let err = ctx.reconcile(&id).await.unwrap_err();

    assert_eq!(err.step, Step::Validate);
    assert!(matches!(err.source, StepError::InvalidConfiguration));
    let stored = ctx.stored(&id);
    assert!(!stored.status.valid_render);
    assert!(!stored.has_finalizer());
    assert_eq!(ctx.terraform.count(TerraformVerb::Plan), 0);
}

#[tokio::test]
async fn status_conflict_fails_the_pass() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.memory.fail_status_writes(1);

    let err = ctx.reconcile(&id).await.unwrap_err();

    assert_eq!(err.step, Step::Status);
    assert!(matches!(
        err.source,
        StepError::Store(StoreError::Conflict { .. })
    ));
    assert!(ctx.terraform.calls().is_empty());
}

#[tokio::test]
async fn concurrent_spec_change_is_not_overwritten() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.reconcile(&id).await.unwrap();
    ctx.terraform.set_delay(Duration::from_millis(50));

    let pass = ctx.reconcile(&id);
    let edit = async {
        tokio::time::sleep(Duration::from_millis(20)).await;
        ctx.memory.apply(
            WorkspaceBuilder::new("default", "vpc")
                .auto_apply(true)
                .build(),
        );
    };
    let (result, ()) = tokio::join!(pass, edit);

    assert!(matches!(
        result.unwrap_err().source,
        StepError::Store(StoreError::Conflict { .. })
    ));
    let stored = ctx.stored(&id);
    assert_eq!(stored.metadata.generation, 2);
    assert!(stored.status.observed_generation < 2);
}
