// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Finalizer-driven deletion

use super::*;
use krec_storage::DeleteOutcome;

/// A processed workspace that has just been marked for deletion.
async fn deleting_workspace(ctx: &TestContext) -> ResourceId {
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());
    assert_eq!(ctx.converge(&id).await, ReconcileOutcome::Done);
    assert_eq!(ctx.memory.mark_for_deletion(&id), DeleteOutcome::Marked);
    ctx.terraform.clear_calls();
    ctx.store.clear_writes();
    id
}

#[tokio::test]
async fn deletion_destroys_once_then_releases_finalizer() {
    let ctx = setup();
    let id = deleting_workspace(&ctx).await;
    let generation = ctx.stored(&id).metadata.generation;

    let outcome = ctx.reconcile(&id).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Deleted);
    assert_eq!(ctx.terraform.count(TerraformVerb::Destroy), 1);
    assert_eq!(ctx.terraform.count(TerraformVerb::Plan), 0);
    assert!(ctx.memory.snapshot(&id).is_none());
    assert_eq!(ctx.notifier.kinds().last(), Some(&NotificationKind::Destroyed));

    // generation is recorded, then the finalizer goes
    let writes = ctx.store.writes();
    let last_two = &writes[writes.len() - 2..];
    match &last_two[0] {
        StoreWrite::Status(status) => assert_eq!(status.observed_generation, generation),
        other => panic!("expected status write, got {other:?}"),
    }
    assert_eq!(last_two[1], StoreWrite::Finalizers(Vec::new()));
}

#[tokio::test]
async fn second_deletion_pass_invokes_nothing() {
    let ctx = setup();
    let id = deleting_workspace(&ctx).await;
    ctx.reconcile(&id).await.unwrap();
    ctx.terraform.clear_calls();

    let outcome = ctx.reconcile(&id).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::NotFound);
    assert!(ctx.terraform.calls().is_empty());
}

#[tokio::test]
async fn deletion_removes_the_working_directory() {
    let ctx = setup();
    let id = deleting_workspace(&ctx).await;
    let dir = ctx.workspace_root().join("default").join("vpc");
    assert!(dir.is_dir());

    ctx.reconcile(&id).await.unwrap();

    assert!(!dir.exists());
}

#[tokio::test]
async fn failed_destroy_keeps_the_finalizer() {
    let ctx = setup();
    let id = deleting_workspace(&ctx).await;
    ctx.terraform
        .fail(TerraformVerb::Destroy, "Error: deleting S3 bucket: BucketNotEmpty");

    let err = ctx.reconcile(&id).await.unwrap_err();

    assert_eq!(err.step, Step::Destroy);
    assert_eq!(err.resource, id);
    let stored = ctx.stored(&id);
    assert!(stored.has_finalizer());
    assert_ne!(stored.status.observed_generation, stored.metadata.generation);
    let last = ctx.notifier.calls().pop().unwrap();
    assert_eq!(last.kind, NotificationKind::TerraformError);
    assert!(last.message.contains("BucketNotEmpty"));

    ctx.terraform.clear_failure(TerraformVerb::Destroy);
    assert_eq!(ctx.reconcile(&id).await.unwrap(), ReconcileOutcome::Deleted);
    assert!(ctx.memory.snapshot(&id).is_none());
}

#[tokio::test]
async fn deleting_without_our_finalizer_skips_destroy() {
    let ctx = setup();
    let mut ws = WorkspaceBuilder::new("default", "vpc").build();
    ws.metadata.add_finalizer("example.com/protect");
    let id = ctx.create(ws);
    assert_eq!(ctx.memory.mark_for_deletion(&id), DeleteOutcome::Marked);

    let outcome = ctx.reconcile(&id).await.unwrap();

    assert_eq!(outcome, ReconcileOutcome::Deleted);
    assert!(ctx.terraform.calls().is_empty());
    assert!(ctx.store.writes().is_empty());
}

#[tokio::test]
async fn deletion_before_first_pass_removes_immediately() {
    let ctx = setup();
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").build());

    assert_eq!(ctx.memory.mark_for_deletion(&id), DeleteOutcome::Removed);
    assert_eq!(ctx.reconcile(&id).await.unwrap(), ReconcileOutcome::NotFound);
    assert!(ctx.terraform.calls().is_empty());
}

#[tokio::test]
async fn deletion_is_not_short_circuited_by_observed_generation() {
    let ctx = setup();
    let id = deleting_workspace(&ctx).await;
    // a previous pass recorded the generation but never released the finalizer
    let mut ws = ctx.stored(&id);
    ws.status.observed_generation = ws.metadata.generation;
    ctx.memory.update_status(&ws).await.unwrap();

    assert_eq!(ctx.reconcile(&id).await.unwrap(), ReconcileOutcome::Deleted);
    assert_eq!(ctx.terraform.count(TerraformVerb::Destroy), 1);
}
