// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bounded subprocess execution

use std::process::Output;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

/// Default timeout for a single terraform command.
/// Applies and destroys of large modules can legitimately run for a long time.
pub const TERRAFORM_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// A command that never produced an exit status.
#[derive(Debug, Error)]
pub enum SubprocessError {
    #[error("{command} could not be started: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{command} timed out after {}s", timeout.as_secs())]
    TimedOut { command: String, timeout: Duration },
}

/// Run `cmd` to completion, capturing its output.
///
/// A non-zero exit is returned as `Ok`; the caller reads the status. The
/// child is killed when the returned future is dropped, so both the timeout
/// and cancellation by the caller stop it.
pub async fn run_bounded(
    mut cmd: Command,
    timeout: Duration,
    command: &str,
) -> Result<Output, SubprocessError> {
    cmd.kill_on_drop(true);
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(result) => result.map_err(|source| SubprocessError::Spawn {
            command: command.to_string(),
            source,
        }),
        Err(_) => Err(SubprocessError::TimedOut {
            command: command.to_string(),
            timeout,
        }),
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
