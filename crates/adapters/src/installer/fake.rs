// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake installer for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{executable_name, InstallerError, ToolInstaller};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

struct FakeInstallerState {
    installs: Vec<String>,
    failures_remaining: usize,
    delay: Option<Duration>,
}

/// Installer that writes a placeholder executable and counts installs
#[derive(Clone)]
pub struct FakeInstaller {
    inner: Arc<Mutex<FakeInstallerState>>,
}

impl Default for FakeInstaller {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeInstallerState {
                installs: Vec::new(),
                failures_remaining: 0,
                delay: None,
            })),
        }
    }
}

impl FakeInstaller {
    pub fn new() -> Self {
        Self::default()
    }

    /// Versions installed, in order (failed attempts included)
    pub fn installs(&self) -> Vec<String> {
        self.inner.lock().installs.clone()
    }

    pub fn install_count(&self) -> usize {
        self.inner.lock().installs.len()
    }

    /// Fail the next `n` installs
    pub fn fail_next(&self, n: usize) {
        self.inner.lock().failures_remaining = n;
    }

    /// Hold every install for `delay`
    pub fn set_delay(&self, delay: Duration) {
        self.inner.lock().delay = Some(delay);
    }
}

#[async_trait]
impl ToolInstaller for FakeInstaller {
    async fn install(&self, version: &str, dir: &Path) -> Result<PathBuf, InstallerError> {
        let (fail, delay) = {
            let mut inner = self.inner.lock();
            inner.installs.push(version.to_string());
            let fail = inner.failures_remaining > 0;
            if fail {
                inner.failures_remaining -= 1;
            }
            (fail, inner.delay)
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(InstallerError::Download {
                url: format!("fake://terraform/{version}"),
                message: "injected failure".to_string(),
            });
        }

        let io = |source| InstallerError::Io {
            path: dir.to_path_buf(),
            source,
        };
        std::fs::create_dir_all(dir).map_err(io)?;
        let path = dir.join(executable_name());
        std::fs::write(&path, format!("#!/bin/sh\n# terraform {version}\n")).map_err(io)?;
        Ok(path)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
