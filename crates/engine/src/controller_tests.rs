// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::reconciler::{ReconcilerConfig, ReconcilerDeps};
use krec_adapters::{FakeInstaller, FakeNotifyAdapter, FakeTerraformAdapter, TerraformVerb};
use krec_core::test_support::WorkspaceBuilder;
use krec_core::FakeClock;
use krec_storage::MemoryStore;
use tempfile::TempDir;

fn id(name: &str) -> ResourceId {
    ResourceId::new("default", name)
}

// --- WorkQueue ---

#[test]
fn add_deduplicates_queued_ids() {
    let queue = WorkQueue::new();
    queue.add(id("a"));
    queue.add(id("b"));
    queue.add(id("a"));

    assert_eq!(queue.len(), 2);
}

#[tokio::test]
async fn next_is_fifo_and_marks_in_flight() {
    let queue = WorkQueue::new();
    queue.add(id("a"));
    queue.add(id("b"));

    assert_eq!(queue.next().await, id("a"));
    assert_eq!(queue.in_flight(), 1);
    assert_eq!(queue.next().await, id("b"));
    assert!(queue.is_empty());
}

#[tokio::test]
async fn in_flight_id_is_not_handed_out_twice() {
    let queue = WorkQueue::new();
    queue.add(id("a"));
    let first = queue.next().await;

    queue.add(id("a"));
    assert!(queue.is_empty());

    queue.done(&first);
    assert_eq!(queue.len(), 1);
    assert_eq!(queue.next().await, id("a"));
}

#[tokio::test]
async fn done_without_new_adds_does_not_requeue() {
    let queue = WorkQueue::new();
    queue.add(id("a"));
    let first = queue.next().await;

    queue.done(&first);

    assert!(queue.is_empty());
    assert_eq!(queue.in_flight(), 0);
}

#[tokio::test]
async fn next_waits_for_an_add() {
    let queue = Arc::new(WorkQueue::new());
    let waiter = {
        let queue = Arc::clone(&queue);
        tokio::spawn(async move { queue.next().await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(!waiter.is_finished());

    queue.add(id("a"));

    let got = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(got, id("a"));
}

#[yare::parameterized(
    first  = { 1, 1 },
    second = { 2, 2 },
    third  = { 3, 4 },
    sixth  = { 6, 32 },
    capped = { 12, 60 },
    huge   = { 200, 60 },
)]
fn backoff_doubles_up_to_the_cap(attempt: u32, expected_secs: u64) {
    let delay = backoff_delay(Duration::from_secs(1), Duration::from_secs(60), attempt);
    assert_eq!(delay, Duration::from_secs(expected_secs));
}

// --- needs_work ---

#[test]
fn needs_work_follows_lifecycle() {
    let mut ws = WorkspaceBuilder::new("default", "a").build();
    ws.metadata.generation = 1;
    assert!(needs_work(&ws, 0));

    ws.status.observed_generation = 1;
    assert!(!needs_work(&ws, 0));

    ws.metadata.deletion_timestamp_ms = Some(1);
    assert!(!needs_work(&ws, 0));

    ws.metadata.add_finalizer(krec_core::WORKSPACE_FINALIZER);
    assert!(needs_work(&ws, 0));
}

// --- Controller ---

type TestController = Controller<
    MemoryStore<FakeClock>,
    FakeTerraformAdapter,
    FakeInstaller,
    FakeNotifyAdapter,
    FakeClock,
>;

struct Harness {
    controller: TestController,
    store: MemoryStore<FakeClock>,
    terraform: FakeTerraformAdapter,
    _dir: TempDir,
}

fn harness(config: ControllerConfig) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let clock = FakeClock::new();
    let store = MemoryStore::with_clock(clock.clone());
    let terraform = FakeTerraformAdapter::new();
    let reconciler = Reconciler::new(
        ReconcilerDeps {
            store: store.clone(),
            terraform: terraform.clone(),
            installer: FakeInstaller::new(),
            notifier: FakeNotifyAdapter::new(),
        },
        ReconcilerConfig {
            workspace_root: dir.path().join("workspaces"),
            install_root: dir.path().join("tools"),
            token_dir: None,
            refresh_interval: None,
        },
        clock,
    )
    .unwrap();
    Harness {
        controller: Controller::new(reconciler, store.clone(), config),
        store,
        terraform,
        _dir: dir,
    }
}

fn fast() -> ControllerConfig {
    ControllerConfig {
        workers: 2,
        poll_interval: Duration::from_millis(10),
        backoff_base: Duration::from_millis(10),
        backoff_max: Duration::from_millis(100),
    }
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn enqueue_pending_skips_processed_workspaces() {
    let h = harness(fast());
    h.store.apply(WorkspaceBuilder::new("default", "a").build());
    h.store.apply(WorkspaceBuilder::new("default", "b").build());
    let mut done = h.store.snapshot(&id("b")).unwrap();
    done.status.observed_generation = done.metadata.generation;
    h.store.update_status(&done).await.unwrap();

    assert_eq!(h.controller.enqueue_pending().await, 1);
    assert_eq!(h.controller.queue().next().await, id("a"));
}

#[tokio::test]
async fn controller_converges_every_workspace() {
    let h = harness(fast());
    for name in ["a", "b", "c"] {
        h.store.apply(WorkspaceBuilder::new("default", name).build());
    }
    let (stop, shutdown) = watch::channel(false);
    let task = tokio::spawn(h.controller.clone().run(shutdown));

    let store = h.store.clone();
    wait_until(move || {
        ["a", "b", "c"].iter().all(|n| {
            store
                .snapshot(&id(n))
                .is_some_and(|ws| ws.status.observed_generation == ws.metadata.generation)
        })
    })
    .await;

    stop.send(true).unwrap();
    task.await.unwrap();
    assert_eq!(h.terraform.count(TerraformVerb::Plan), 3);
}

#[tokio::test]
async fn controller_finishes_deletion() {
    let h = harness(fast());
    h.store.apply(WorkspaceBuilder::new("default", "a").build());
    let (stop, shutdown) = watch::channel(false);
    let task = tokio::spawn(h.controller.clone().run(shutdown));

    let store = h.store.clone();
    wait_until(move || {
        store
            .snapshot(&id("a"))
            .is_some_and(|ws| ws.status.observed_generation == ws.metadata.generation)
    })
    .await;
    h.store.mark_for_deletion(&id("a"));
    let store = h.store.clone();
    wait_until(move || store.snapshot(&id("a")).is_none()).await;

    stop.send(true).unwrap();
    task.await.unwrap();
    assert_eq!(h.terraform.count(TerraformVerb::Destroy), 1);
}

#[tokio::test]
async fn failing_workspace_backs_off() {
    let h = harness(ControllerConfig {
        backoff_base: Duration::from_secs(60),
        backoff_max: Duration::from_secs(60),
        ..fast()
    });
    h.terraform.fail(TerraformVerb::Init, "Error: registry unavailable");
    h.store.apply(WorkspaceBuilder::new("default", "a").build());
    let (stop, shutdown) = watch::channel(false);
    let task = tokio::spawn(h.controller.clone().run(shutdown));

    let terraform = h.terraform.clone();
    wait_until(move || terraform.count(TerraformVerb::Init) == 1).await;
    tokio::time::sleep(Duration::from_millis(100)).await;

    stop.send(true).unwrap();
    task.await.unwrap();
    assert_eq!(h.terraform.count(TerraformVerb::Init), 1);
}

#[tokio::test]
async fn shutdown_cancels_in_flight_passes() {
    let h = harness(fast());
    h.terraform.set_delay(Duration::from_secs(3600));
    h.store.apply(WorkspaceBuilder::new("default", "a").build());
    let (stop, shutdown) = watch::channel(false);
    let task = tokio::spawn(h.controller.clone().run(shutdown));

    let terraform = h.terraform.clone();
    wait_until(move || !terraform.calls().is_empty()).await;

    stop.send(true).unwrap();
    tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(h.controller.queue().in_flight(), 0);

    // the cancelled init released the plugin cache lock
    tokio::time::timeout(
        Duration::from_secs(1),
        h.controller.reconciler().tools().init_lock(),
    )
    .await
    .unwrap();
}
