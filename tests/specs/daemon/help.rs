//! Daemon help and version specs
//!
//! Verify krecd --help, --version, and related flags work without
//! acquiring the daemon lock (no startup attempt).

use crate::prelude::*;

const VERSION_LINE: &str = concat!("krecd ", env!("CARGO_PKG_VERSION"), "\n");

#[test]
fn krecd_version_shows_version() {
    krecd_assert()
        .arg("--version")
        .assert()
        .success()
        .stdout(VERSION_LINE);
}

#[test]
fn krecd_short_version_flags_match() {
    for flag in ["-v", "-V"] {
        krecd_assert().arg(flag).assert().success().stdout(VERSION_LINE);
    }
}

#[test]
fn krecd_help_shows_usage() {
    let output = krecd_assert().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("USAGE:"), "got: {stdout}");
    assert!(stdout.contains("KREC_CONFIG"), "got: {stdout}");
}

#[test]
fn krecd_rejects_unknown_arguments() {
    let output = krecd_assert().arg("--frobnicate").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unexpected argument '--frobnicate'"), "got: {stderr}");
}

#[test]
fn krecd_version_does_not_take_the_lock() {
    let dir = tempfile::tempdir().unwrap();
    let output = krecd(dir.path()).arg("--version").output().unwrap();
    assert!(output.status.success());
    assert!(!dir.path().join("daemon.pid").exists());
}
