//! Daemon lifecycle specs
//!
//! Start, single-instance lock, and shutdown on SIGTERM.

use crate::prelude::*;
use std::io::{BufRead, BufReader};
use std::process::{Child, Stdio};

/// Start krecd and wait for its READY line.
fn start(state_dir: &std::path::Path) -> Child {
    let mut child = krecd(state_dir)
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();
    let stdout = child.stdout.take().unwrap();
    let mut line = String::new();
    BufReader::new(stdout).read_line(&mut line).unwrap();
    assert_eq!(line.trim(), "READY");
    child
}

fn terminate(child: &Child) {
    let status = std::process::Command::new("kill")
        .args(["-TERM", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(status.success());
}

#[test]
fn daemon_writes_pid_and_stops_on_sigterm() {
    let dir = tempfile::tempdir().unwrap();
    let mut child = start(dir.path());

    let pid_file = dir.path().join("daemon.pid");
    let pid = std::fs::read_to_string(&pid_file).unwrap();
    assert_eq!(pid.trim(), child.id().to_string());
    assert!(dir.path().join("manifests").is_dir());
    assert!(dir.path().join("daemon.log").exists());

    terminate(&child);
    let status = child.wait().unwrap();
    assert!(status.success(), "exit: {status:?}");
    assert!(!pid_file.exists());
}

#[test]
fn second_daemon_reports_running_instance() {
    let dir = tempfile::tempdir().unwrap();
    let mut first = start(dir.path());

    let output = krecd(dir.path()).output().unwrap();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("krecd is already running"), "got: {stderr}");
    assert!(stderr.contains(&format!("pid: {}", first.id())), "got: {stderr}");

    terminate(&first);
    first.wait().unwrap();
}

#[test]
fn daemon_ingests_manifests_into_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let manifests = dir.path().join("manifests");
    std::fs::create_dir_all(&manifests).unwrap();
    std::fs::write(
        manifests.join("settings.json"),
        r#"{ "kind": "ConfigMap", "metadata": { "name": "settings" }, "data": { "region": "eu-west-1" } }"#,
    )
    .unwrap();
    let mut child = start(dir.path());

    let snapshot = dir.path().join("store.json");
    assert!(wait_for(|| std::fs::read_to_string(&snapshot)
        .is_ok_and(|text| text.contains("eu-west-1"))));

    terminate(&child);
    assert!(child.wait().unwrap().success());
}

#[test]
fn malformed_config_file_fails_startup() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("config.toml"), "max_concurrent_reconciles = \"lots\"").unwrap();

    let output = krecd(dir.path()).output().unwrap();

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid config file"), "got: {stderr}");
    assert!(!dir.path().join("daemon.pid").exists());
}
