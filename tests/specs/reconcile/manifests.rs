//! Manifest-driven reconciliation specs
//!
//! Manifests on disk flow through the file-backed store and the controller
//! into terraform runs (faked), and back into persisted status.

use crate::prelude::*;
use krec_adapters::{
    FakeInstaller, FakeNotifyAdapter, FakeTerraformAdapter, TerraformVerb, WorkspaceStore,
};
use krec_core::{NotificationKind, ResourceId, SystemClock};
use krec_engine::{Controller, ControllerConfig, Reconciler, ReconcilerConfig, ReconcilerDeps};
use krec_storage::FsStore;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::watch;

type SpecController =
    Controller<FsStore, FakeTerraformAdapter, FakeInstaller, FakeNotifyAdapter, SystemClock>;

struct Harness {
    dir: TempDir,
    store: FsStore,
    terraform: FakeTerraformAdapter,
    installer: FakeInstaller,
    notifier: FakeNotifyAdapter,
    controller: SpecController,
}

impl Harness {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self::open(dir)
    }

    /// Open a store and controller over an existing state directory.
    fn open(dir: TempDir) -> Self {
        std::fs::create_dir_all(dir.path().join("manifests")).unwrap();
        let store = FsStore::open(dir.path(), &dir.path().join("manifests")).unwrap();
        let terraform = FakeTerraformAdapter::new();
        let installer = FakeInstaller::new();
        let notifier = FakeNotifyAdapter::new();
        let reconciler = Reconciler::new(
            ReconcilerDeps {
                store: store.clone(),
                terraform: terraform.clone(),
                installer: installer.clone(),
                notifier: notifier.clone(),
            },
            ReconcilerConfig {
                workspace_root: dir.path().join("workspaces"),
                install_root: dir.path().join("tools"),
                token_dir: None,
                refresh_interval: None,
            },
            SystemClock,
        )
        .unwrap();
        let controller = Controller::new(
            reconciler,
            store.clone(),
            ControllerConfig {
                workers: 2,
                poll_interval: Duration::from_millis(SPEC_POLL_INTERVAL_MS),
                backoff_base: Duration::from_millis(10),
                backoff_max: Duration::from_millis(100),
            },
        );
        Self {
            dir,
            store,
            terraform,
            installer,
            notifier,
            controller,
        }
    }

    fn manifests(&self) -> PathBuf {
        self.dir.path().join("manifests")
    }

    fn workdir(&self, name: &str) -> PathBuf {
        self.dir.path().join("workspaces/default").join(name)
    }

    fn write_manifest(&self, file: &str, text: &str) {
        std::fs::write(self.manifests().join(file), text).unwrap();
        self.store.sync_manifests().unwrap();
    }

    fn remove_manifest(&self, file: &str) {
        std::fs::remove_file(self.manifests().join(file)).unwrap();
        self.store.sync_manifests().unwrap();
    }

    fn start(&self) -> (watch::Sender<bool>, tokio::task::JoinHandle<()>) {
        let (stop, shutdown) = watch::channel(false);
        let task = tokio::spawn(self.controller.clone().run(shutdown));
        (stop, task)
    }

    async fn converged(&self, id: &ResourceId) -> bool {
        self.store
            .get(id)
            .await
            .unwrap()
            .is_some_and(|ws| ws.status.observed_generation == ws.metadata.generation)
    }

    async fn wait_converged(&self, id: &ResourceId) -> bool {
        wait_for_async(move || self.converged(id)).await
    }

    /// Wait until `id` has processed `generation`.
    async fn wait_generation(&self, id: &ResourceId, generation: i64) -> bool {
        wait_for_async(move || async move {
            self.store.get(id).await.unwrap().is_some_and(|ws| {
                ws.metadata.generation == generation && ws.status.observed_generation == generation
            })
        })
        .await
    }

    async fn wait_gone(&self, id: &ResourceId) -> bool {
        wait_for_async(move || async move { self.store.get(id).await.unwrap().is_none() }).await
    }
}

fn vpc() -> ResourceId {
    ResourceId::new("default", "vpc")
}

fn named(name: &str) -> String {
    WORKSPACE_MANIFEST.replace(r#""name": "vpc" }"#, &format!(r#""name": "{name}" }}"#))
}

fn main_tf(workdir: &Path) -> String {
    std::fs::read_to_string(workdir.join("main.tf")).unwrap()
}

#[tokio::test]
async fn manifest_workspace_is_planned_then_destroyed_when_removed() {
    let h = Harness::new();
    let id = vpc();
    h.write_manifest("vpc.json", WORKSPACE_MANIFEST);
    let (stop, task) = h.start();

    assert!(h.wait_converged(&id).await);
    assert!(main_tf(&h.workdir("vpc")).contains("terraform-aws-modules/vpc/aws"));
    assert_eq!(h.terraform.count(TerraformVerb::Apply), 0);
    assert!(h.notifier.kinds().contains(&NotificationKind::Planned));

    h.remove_manifest("vpc.json");
    assert!(h.wait_gone(&id).await);

    let workdir = &h.workdir("vpc");
    assert!(wait_for_async(move || async move { !workdir.exists() }).await);

    stop.send(true).unwrap();
    task.await.unwrap();
    assert_eq!(h.terraform.count(TerraformVerb::Destroy), 1);
}

#[tokio::test]
async fn auto_apply_manifest_applies_pending_changes() {
    let h = Harness::new();
    let id = vpc();
    h.terraform.set_plan_adds(3);
    h.write_manifest(
        "vpc.json",
        &WORKSPACE_MANIFEST.replace(
            r#""terraformVersion""#,
            r#""autoApply": true, "terraformVersion""#,
        ),
    );
    let (stop, task) = h.start();

    assert!(h.wait_converged(&id).await);
    stop.send(true).unwrap();
    task.await.unwrap();

    assert_eq!(h.terraform.count(TerraformVerb::Apply), 1);
    let ws = h.store.get(&id).await.unwrap().unwrap();
    assert!(ws.status.plan_has_changes);
    assert!(h.notifier.kinds().contains(&NotificationKind::Applied));
}

#[tokio::test]
async fn workspaces_sharing_a_version_install_it_once() {
    let h = Harness::new();
    for name in ["vpc", "dns", "iam"] {
        h.write_manifest(&format!("{name}.json"), &named(name));
    }
    let (stop, task) = h.start();

    for name in ["vpc", "dns", "iam"] {
        let id = ResourceId::new("default", name);
        assert!(h.wait_converged(&id).await, "{id} did not converge");
    }
    stop.send(true).unwrap();
    task.await.unwrap();

    assert_eq!(h.installer.install_count(), 1);
    assert!(h.dir.path().join("tools/1.11.2/terraform").is_file());
}

#[tokio::test]
async fn converged_state_survives_a_restart() {
    let h = Harness::new();
    let id = vpc();
    h.write_manifest("vpc.json", WORKSPACE_MANIFEST);
    let (stop, task) = h.start();
    assert!(h.wait_converged(&id).await);
    stop.send(true).unwrap();
    task.await.unwrap();
    let plans = h.terraform.count(TerraformVerb::Plan);
    assert_eq!(plans, 1);

    let Harness { dir, .. } = h;
    let restarted = Harness::open(dir);
    restarted.store.sync_manifests().unwrap();

    assert!(restarted.converged(&id).await);
    assert_eq!(restarted.controller.enqueue_pending().await, 0);
}

#[tokio::test]
async fn editing_a_manifest_triggers_a_new_plan() {
    let h = Harness::new();
    let id = vpc();
    h.write_manifest("vpc.json", WORKSPACE_MANIFEST);
    let (stop, task) = h.start();
    assert!(h.wait_converged(&id).await);

    h.write_manifest("vpc.json", &WORKSPACE_MANIFEST.replace("5.19.0", "5.20.0"));
    assert!(h.wait_generation(&id, 2).await);
    stop.send(true).unwrap();
    task.await.unwrap();

    assert_eq!(h.terraform.count(TerraformVerb::Plan), 2);
    assert!(main_tf(&h.workdir("vpc")).contains("5.20.0"));
}
