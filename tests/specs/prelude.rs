//! Test helpers for behavioral specifications.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

// Spec polling timeouts
pub const SPEC_POLL_INTERVAL_MS: u64 = 10;
pub const SPEC_WAIT_MAX_MS: u64 = 5000;

/// Environment variables the daemon reads; cleared so the host cannot leak in.
const KREC_VARS: &[&str] = &[
    "KREC_CONFIG",
    "KREC_MANIFESTS_PATH",
    "KREC_WORKSPACE_PATH",
    "KREC_INSTALL_PATH",
    "KREC_MAX_CONCURRENT_RECONCILES",
    "KREC_POLL_INTERVAL_MS",
    "KREC_REFRESH_INTERVAL_SECS",
    "KREC_TERRAFORM_TIMEOUT_SECS",
    "KREC_RELEASES_URL",
];

pub const WORKSPACE_MANIFEST: &str = r#"{
    "kind": "Workspace",
    "metadata": { "name": "vpc" },
    "spec": {
        "terraformVersion": "1.11.2",
        "backend": { "type": "s3", "inputs": { "bucket": "my-bucket" } },
        "providerSpecs": [{ "name": "aws", "source": "hashicorp/aws", "version": "1.0" }],
        "module": { "name": "vpc", "source": "terraform-aws-modules/vpc/aws", "version": "5.19.0" }
    }
}"#;

/// Returns the path to a binary, checking llvm-cov target directory first.
/// Falls back to resolving relative to the test binary itself.
fn binary_path(name: &str) -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));

    let llvm_cov_path = manifest_dir.join("target/llvm-cov-target/debug").join(name);
    if llvm_cov_path.exists() {
        return llvm_cov_path;
    }

    let standard = manifest_dir.join("target/debug").join(name);
    if standard.exists() {
        return standard;
    }

    // The test binary lives at target/debug/deps/specs-<hash>
    if let Ok(exe) = std::env::current_exe() {
        if let Some(debug_dir) = exe.parent().and_then(|d| d.parent()) {
            let fallback = debug_dir.join(name);
            if fallback.exists() {
                return fallback;
            }
        }
    }

    standard
}

/// Returns the path to the krecd daemon binary.
pub fn krecd_binary() -> PathBuf {
    binary_path("krecd")
}

/// krecd with an isolated state directory
pub fn krecd(state_dir: &Path) -> std::process::Command {
    let mut cmd = std::process::Command::new(krecd_binary());
    for var in KREC_VARS {
        cmd.env_remove(var);
    }
    cmd.env("KREC_STATE_DIR", state_dir)
        .env("KREC_POLL_INTERVAL_MS", "50");
    cmd
}

/// krecd wrapped for output assertions
pub fn krecd_assert() -> assert_cmd::Command {
    assert_cmd::Command::new(krecd_binary())
}

/// Poll `condition` until true or the polling timeout elapses.
pub fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS));
    }
    condition()
}

/// Async variant of [`wait_for`].
pub async fn wait_for_async<F, Fut>(mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
    while Instant::now() < deadline {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(SPEC_POLL_INTERVAL_MS)).await;
    }
    false
}
