// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live workspace passes: finalizer, plan, apply, idempotence

use super::*;
use krec_core::test_support::SAMPLE_RENDER;

#[tokio::test]
async fn missing_workspace_is_a_no_op() {
    let ctx = setup();

    let outcome = ctx.reconcile(&ResourceId::new("default", "ghost")).await;

    assert_eq!(outcome.unwrap(), ReconcileOutcome::NotFound);
    assert!(ctx.terraform.calls().is_empty());
    assert!(ctx.store.writes().is_empty());
}

#[tokio::test]
async fn first_pass_records_finalizer_before_planning() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());

    let outcome = ctx.reconcile(&id).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Requeue);
    assert_eq!(
        ctx.terraform.verbs(),
        vec![TerraformVerb::Init, TerraformVerb::Validate]
    );
    let stored = ctx.stored(&id);
    assert!(stored.has_finalizer());
    assert_eq!(stored.status.current_render, SAMPLE_RENDER);
    assert!(stored.status.valid_render);
    assert_eq!(stored.status.observed_generation, 0);
    assert!(ctx.notifier.calls().is_empty());
}

#[tokio::test]
async fn second_pass_plans_and_records_generation() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.reconcile(&id).await.unwrap();
    ctx.terraform.clear_calls();

    let outcome = ctx.reconcile(&id).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Done);
    assert_eq!(
        ctx.terraform.verbs(),
        vec![
            TerraformVerb::Init,
            TerraformVerb::Validate,
            TerraformVerb::Plan,
            TerraformVerb::ShowPlan
        ]
    );
    let stored = ctx.stored(&id);
    assert_eq!(stored.status.observed_generation, stored.metadata.generation);
    assert!(!stored.status.latest_plan.is_empty());
    assert!(!stored.status.plan_has_changes);
    assert_eq!(ctx.notifier.kinds(), vec![NotificationKind::Planned]);
}

#[tokio::test]
async fn processed_generation_short_circuits() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    assert_eq!(ctx.converge(&id).await, ReconcileOutcome::Done);
    ctx.terraform.clear_calls();
    ctx.store.clear_writes();

    let outcome = ctx.reconcile(&id).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::UpToDate);
    assert!(ctx.terraform.calls().is_empty());
    assert!(ctx.store.writes().is_empty());
}

#[tokio::test]
async fn status_writes_follow_step_order() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.reconcile(&id).await.unwrap();
    ctx.store.clear_writes();
    ctx.terraform.set_plan_adds(2);

    ctx.reconcile(&id).await.unwrap();

    let writes = ctx.store.status_writes();
    assert_eq!(writes.len(), 4);
    // render, validity, plan, generation
    assert_eq!(writes[0].current_render, SAMPLE_RENDER);
    assert!(writes[1].valid_render);
    assert!(writes[1].latest_plan.is_empty());
    assert!(writes[2].plan_has_changes);
    assert!(!writes[2].latest_plan.is_empty());
    assert_eq!(writes[2].observed_generation, 0);
    assert_eq!(writes[3].observed_generation, 1);
}

#[tokio::test]
async fn rendered_document_lands_in_the_working_directory() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("team-a", "vpc").build());

    ctx.reconcile(&id).await.unwrap();

    let dir = ctx.workspace_root().join("team-a").join("vpc");
    assert_eq!(
        std::fs::read_to_string(dir.join(krec_render::DOCUMENT_FILE)).unwrap(),
        SAMPLE_RENDER
    );
    let call = &ctx.terraform.calls()[0];
    assert_eq!(call.working_dir, dir);
    assert!(call.executable.starts_with(ctx.install_root().join("1.11.2")));
}

#[tokio::test]
async fn every_call_shares_the_plugin_cache() {
    let ctx = setup();
    let a = ctx.create(WorkspaceBuilder::new("default", "a").build());
    let b = ctx.create(WorkspaceBuilder::new("default", "b").build());

    ctx.converge(&a).await;
    ctx.converge(&b).await;

    let expected = ctx.install_root().join(crate::tool_cache::PLUGIN_CACHE_DIR);
    let calls = ctx.terraform.calls();
    assert!(calls
        .iter()
        .all(|c| c.env_value(PLUGIN_CACHE_VAR) == Some(expected.display().to_string().as_str())));
    assert_eq!(ctx.installer.install_count(), 1);
}

#[tokio::test]
async fn auto_apply_runs_only_when_plan_has_changes() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").auto_apply(true).build());
    ctx.terraform.set_plan_adds(3);

    assert_eq!(ctx.converge(&id).await, ReconcileOutcome::Done);

    assert_eq!(ctx.terraform.count(TerraformVerb::Apply), 1);
    assert_eq!(
        ctx.notifier.kinds(),
        vec![NotificationKind::Planned, NotificationKind::Applied]
    );
    let planned = &ctx.notifier.calls()[0];
    assert_eq!(planned.message, "Plan: 3 to add, 0 to change, 0 to destroy.");
}

#[tokio::test]
async fn auto_apply_skips_a_no_op_plan() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").auto_apply(true).build());

    ctx.converge(&id).await;

    assert_eq!(ctx.terraform.count(TerraformVerb::Apply), 0);
    assert_eq!(ctx.notifier.kinds(), vec![NotificationKind::Planned]);
}

#[tokio::test]
async fn drift_without_auto_apply_is_only_reported() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.terraform.set_plan_adds(1);

    ctx.converge(&id).await;

    assert_eq!(ctx.terraform.count(TerraformVerb::Apply), 0);
    assert!(ctx.stored(&id).status.plan_has_changes);
}

#[tokio::test]
async fn spec_change_is_planned_again() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.converge(&id).await;
    ctx.terraform.clear_calls();

    ctx.memory.apply(
        WorkspaceBuilder::new("default", "vpc")
            .module_inputs(r#"{"cidr": "10.0.0.0/16"}"#)
            .build(),
    );
    let outcome = ctx.reconcile(&id).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Done);
    assert_eq!(ctx.terraform.count(TerraformVerb::Plan), 1);
    let stored = ctx.stored(&id);
    assert_eq!(stored.metadata.generation, 2);
    assert_eq!(stored.status.observed_generation, 2);
    assert!(stored.status.current_render.contains("cidr"));
}

#[tokio::test]
async fn new_version_is_installed_on_demand() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.converge(&id).await;

    ctx.memory.apply(
        WorkspaceBuilder::new("default", "vpc")
            .terraform_version("1.12.0")
            .build(),
    );
    ctx.converge(&id).await;

    assert_eq!(
        ctx.installer.installs(),
        vec!["1.11.2".to_string(), "1.12.0".to_string()]
    );
}

#[tokio::test]
async fn refresh_is_scheduled_and_honoured() {
    let ctx = setup_with_refresh(Some(Duration::from_secs(600)));
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.converge(&id).await;

    let due = ctx.stored(&id).status.next_refresh_timestamp_ms.unwrap();
    assert_eq!(due, ctx.clock.epoch_ms() + 600_000);
    assert_eq!(ctx.reconcile(&id).await.unwrap(), ReconcileOutcome::UpToDate);

    ctx.clock.advance(Duration::from_secs(600));
    ctx.terraform.clear_calls();
    assert_eq!(ctx.reconcile(&id).await.unwrap(), ReconcileOutcome::Done);
    assert_eq!(ctx.terraform.count(TerraformVerb::Plan), 1);
}

#[tokio::test]
async fn huge_refresh_interval_saturates() {
    let ctx = setup_with_refresh(Some(Duration::MAX));
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.converge(&id).await;

    assert_eq!(
        ctx.stored(&id).status.next_refresh_timestamp_ms,
        Some(u64::MAX)
    );
    assert_eq!(ctx.reconcile(&id).await.unwrap(), ReconcileOutcome::UpToDate);
}

#[tokio::test]
async fn no_refresh_is_scheduled_by_default() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    ctx.converge(&id).await;

    assert_eq!(ctx.stored(&id).status.next_refresh_timestamp_ms, None);
}
