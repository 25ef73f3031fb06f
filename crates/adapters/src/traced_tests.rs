// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::installer::FakeInstaller;
use crate::terraform::FakeTerraformAdapter;
use serial_test::serial;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;

/// A writer that captures log output for testing
#[derive(Clone, Default)]
struct CapturedLogs {
    logs: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    fn new() -> Self {
        Self::default()
    }

    fn contents(&self) -> String {
        let logs = self.logs.lock().unwrap();
        String::from_utf8_lossy(&logs).to_string()
    }
}

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.logs.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for CapturedLogs {
    type Writer = CapturedLogs;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Run a test with captured tracing output
fn with_tracing<F, Fut>(f: F) -> (String, Fut::Output)
where
    F: FnOnce() -> Fut,
    Fut: std::future::Future,
{
    let logs = CapturedLogs::new();
    let logs_clone = logs.clone();

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_writer(logs_clone)
        .with_ansi(false)
        .without_time()
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(f())
    });

    (logs.contents(), result)
}

/// Assert that captured logs contain the expected substring
fn assert_log(logs: &str, label: &str, expected: &str) {
    assert!(logs.contains(expected), "Should log {label}. Logs:\n{logs}",);
}

fn target() -> TerraformTarget {
    TerraformTarget {
        executable: PathBuf::from("/opt/tf/1.11.2/terraform"),
        working_dir: PathBuf::from("/work/default/ws"),
        env: vec![("AWS_REGION".to_string(), "eu-west-1".to_string())],
    }
}

#[test]
#[serial(tracing)]
fn traced_init_logs_span_and_timing() {
    let (logs, result) = with_tracing(|| async {
        let traced = TracedTerraform::new(FakeTerraformAdapter::new());
        traced.init(&target()).await
    });

    assert!(result.is_ok());
    assert_log(&logs, "span name", "terraform{");
    assert_log(&logs, "span verb", "init");
    assert_log(&logs, "working dir", "/work/default/ws");
    assert_log(&logs, "entry", "starting");
    assert_log(&logs, "completion", "terraform init finished");
    assert_log(&logs, "timing", "elapsed_ms");
}

#[test]
#[serial(tracing)]
fn traced_plan_logs_summary() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeTerraformAdapter::new();
        fake.set_plan_adds(3);
        TracedTerraform::new(fake).plan(&target()).await
    });

    assert!(result.unwrap().has_changes());
    assert_log(&logs, "plan summary", "plan summary");
    assert_log(&logs, "add count", "add=3");
}

#[test]
#[serial(tracing)]
fn traced_failure_logs_error_with_diagnostics() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeTerraformAdapter::new();
        fake.fail(TerraformVerb::Apply, "Error: quota exceeded");
        TracedTerraform::new(fake).apply(&target()).await
    });

    assert!(result.is_err());
    assert_log(&logs, "failure", "terraform apply failed");
    assert_log(&logs, "diagnostics", "quota exceeded");
}

#[test]
#[serial(tracing)]
fn traced_validate_warns_on_invalid_config() {
    let (logs, result) = with_tracing(|| async {
        let fake = FakeTerraformAdapter::new();
        fake.set_valid(false);
        TracedTerraform::new(fake).validate(&target()).await
    });

    assert!(!result.unwrap());
    assert_log(&logs, "invalid warning", "configuration is not valid");
}

#[test]
#[serial(tracing)]
fn traced_installer_logs_path() {
    let dir = tempfile::tempdir().unwrap();
    let install_dir = dir.path().join("1.11.2");
    let (logs, result) = with_tracing(|| async {
        TracedInstaller::new(FakeInstaller::new())
            .install("1.11.2", &install_dir)
            .await
    });

    assert!(result.is_ok());
    assert_log(&logs, "span", "installer.install");
    assert_log(&logs, "version", "1.11.2");
    assert_log(&logs, "completion", "terraform installed");
}

#[tokio::test]
async fn traced_terraform_delegates_to_inner() {
    let fake = FakeTerraformAdapter::new();
    let traced = TracedTerraform::new(fake.clone());
    let t = target();

    traced.init(&t).await.unwrap();
    traced.validate(&t).await.unwrap();
    traced.plan(&t).await.unwrap();
    traced.show_plan(&t).await.unwrap();
    traced.apply(&t).await.unwrap();
    traced.destroy(&t).await.unwrap();

    assert_eq!(
        fake.verbs(),
        vec![
            TerraformVerb::Init,
            TerraformVerb::Validate,
            TerraformVerb::Plan,
            TerraformVerb::ShowPlan,
            TerraformVerb::Apply,
            TerraformVerb::Destroy,
        ]
    );
}

#[tokio::test]
async fn traced_installer_propagates_errors() {
    let dir = tempfile::tempdir().unwrap();
    let fake = FakeInstaller::new();
    fake.fail_next(1);
    let traced = TracedInstaller::new(fake.clone());
    assert!(traced.install("1.0.0", dir.path()).await.is_err());
    assert_eq!(fake.install_count(), 1);
}
