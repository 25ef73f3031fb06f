// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use crate::subprocess::SubprocessError;

/// Write a stand-in terraform that logs its arguments and runs `body`.
fn fake_binary(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("terraform");
    let script = format!(
        "#!/bin/sh\necho \"$@\" >> \"{}\"\n{}\n",
        dir.join("args.log").display(),
        body
    );
    std::fs::write(&path, script).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn target(dir: &Path, executable: std::path::PathBuf) -> TerraformTarget {
    TerraformTarget {
        executable,
        working_dir: dir.to_path_buf(),
        env: vec![("KREC_TEST_VALUE".to_string(), "from-env".to_string())],
    }
}

fn logged_args(dir: &Path) -> String {
    std::fs::read_to_string(dir.join("args.log")).unwrap()
}

#[tokio::test]
async fn init_passes_chdir_upgrade_and_json_flags() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_binary(dir.path(), "exit 0");
    CliTerraformAdapter::new()
        .init(&target(dir.path(), bin))
        .await
        .unwrap();

    let args = logged_args(dir.path());
    assert!(args.starts_with(&format!("-chdir={} init -no-color -json", dir.path().display())));
    assert!(args.contains("-upgrade"));
}

#[tokio::test]
async fn target_env_and_automation_flag_reach_the_process() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_binary(
        dir.path(),
        "echo \"{\\\"valid\\\": true, \\\"env\\\": \\\"$KREC_TEST_VALUE/$TF_IN_AUTOMATION\\\"}\"",
    );
    let valid = CliTerraformAdapter::new()
        .validate(&target(dir.path(), bin.clone()))
        .await
        .unwrap();
    assert!(valid);

    let bin_env = fake_binary(dir.path(), "echo \"$KREC_TEST_VALUE/$TF_IN_AUTOMATION\"");
    let out = CliTerraformAdapter::new()
        .show_plan(&target(dir.path(), bin_env))
        .await
        .unwrap();
    assert_eq!(out.trim(), "from-env/1");
}

#[tokio::test]
async fn non_empty_stderr_is_a_failure_even_on_success_exit() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_binary(dir.path(), "echo 'Error: backend unreachable' >&2\nexit 0");
    let err = CliTerraformAdapter::new()
        .init(&target(dir.path(), bin))
        .await
        .unwrap_err();
    match err {
        TerraformError::CommandFailed { verb, diagnostics } => {
            assert_eq!(verb, TerraformVerb::Init);
            assert_eq!(diagnostics.trim(), "Error: backend unreachable");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn invalid_configuration_exit_reports_not_valid() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_binary(
        dir.path(),
        "echo '{\"valid\": false, \"error_count\": 1}'\nexit 1",
    );
    let valid = CliTerraformAdapter::new()
        .validate(&target(dir.path(), bin))
        .await
        .unwrap();
    assert!(!valid);
}

async fn validate_error(body: &str) -> TerraformError {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_binary(dir.path(), body);
    CliTerraformAdapter::new()
        .validate(&target(dir.path(), bin))
        .await
        .unwrap_err()
}

#[tokio::test]
async fn validate_exit_one_without_verdict_is_a_failure() {
    let err = validate_error("echo 'Error: unreadable module'\nexit 1").await;
    assert!(
        matches!(&err, TerraformError::CommandFailed { verb: TerraformVerb::Validate, diagnostics } if diagnostics.contains("unreadable module")),
        "got: {err}"
    );
}

#[tokio::test]
async fn validate_crash_exit_code_is_a_failure_even_with_verdict() {
    let err = validate_error("echo '{\"valid\": false}'\nexit 2").await;
    assert!(
        matches!(
            &err,
            TerraformError::CommandFailed {
                verb: TerraformVerb::Validate,
                ..
            }
        ),
        "got: {err}"
    );
}

#[tokio::test]
async fn non_zero_exit_without_stderr_reports_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_binary(dir.path(), "echo 'Error: no configuration files'\nexit 1");
    let err = CliTerraformAdapter::new()
        .init(&target(dir.path(), bin))
        .await
        .unwrap_err();
    assert!(
        matches!(&err, TerraformError::CommandFailed { diagnostics, .. } if diagnostics.contains("no configuration files")),
        "got: {err}"
    );
}

#[tokio::test]
async fn plan_reads_change_summary_and_saves_plan_file() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_binary(
        dir.path(),
        r#"echo '{"type":"version","terraform":"1.11.2"}'
echo '{"type":"change_summary","changes":{"add":2,"change":0,"import":0,"remove":1,"operation":"plan"}}'"#,
    );
    let summary = CliTerraformAdapter::new()
        .plan(&target(dir.path(), bin))
        .await
        .unwrap();
    assert_eq!(
        summary,
        PlanSummary {
            add: 2,
            change: 0,
            remove: 1,
            import: 0
        }
    );
    assert!(logged_args(dir.path()).contains("-out=plan.tfplan"));
}

#[tokio::test]
async fn plan_without_summary_is_unexpected_output() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_binary(dir.path(), "echo '{\"type\":\"version\"}'");
    let err = CliTerraformAdapter::new()
        .plan(&target(dir.path(), bin))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TerraformError::UnexpectedOutput {
            verb: TerraformVerb::Plan,
            ..
        }
    ));
}

#[tokio::test]
async fn timeout_is_reported_as_spawn_error() {
    let dir = tempfile::tempdir().unwrap();
    let bin = fake_binary(dir.path(), "sleep 10");
    let err = CliTerraformAdapter::with_timeout(Duration::from_millis(100))
        .destroy(&target(dir.path(), bin))
        .await
        .unwrap_err();
    assert!(matches!(
        &err,
        TerraformError::Spawn(SubprocessError::TimedOut { .. })
    ));
}

#[yare::parameterized(
    no_changes = { r#"{"type":"change_summary","changes":{"add":0,"change":0,"remove":0}}"#, false },
    add        = { r#"{"type":"change_summary","changes":{"add":1,"change":0,"remove":0}}"#, true },
    import     = { r#"{"type":"change_summary","changes":{"add":0,"change":0,"remove":0,"import":3}}"#, true },
)]
fn change_summary_drift(line: &str, drift: bool) {
    let summary = parse_change_summary(line).unwrap();
    assert_eq!(summary.has_changes(), drift);
}

#[test]
fn change_summary_ignores_noise_lines() {
    let stream = "not json\n{\"type\":\"planned_change\"}\n";
    assert!(parse_change_summary(stream).is_none());
}

#[test]
fn validity_parsing() {
    assert_eq!(parse_validity(r#"{"valid": true, "error_count": 0}"#), Some(true));
    assert_eq!(parse_validity(r#"{"valid": false}"#), Some(false));
    assert_eq!(parse_validity("garbage"), None);
}
