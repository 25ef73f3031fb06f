// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terraform binary installation

mod releases;

pub use releases::{ReleasesInstaller, DEFAULT_RELEASES_URL};

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeInstaller;

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors from installing a terraform release
#[derive(Debug, Error)]
pub enum InstallerError {
    #[error("no terraform build for {os}/{arch}")]
    UnsupportedPlatform {
        os: &'static str,
        arch: &'static str,
    },
    #[error("download of {url} failed: {message}")]
    Download { url: String, message: String },
    #[error("no checksum listed for {file}")]
    ChecksumMissing { file: String },
    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },
    #[error("bad release archive: {0}")]
    Archive(String),
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("install task failed: {0}")]
    Task(String),
}

/// Installs a terraform version into a directory.
#[async_trait]
pub trait ToolInstaller: Clone + Send + Sync + 'static {
    /// Install `version` into `dir` and return the executable path.
    async fn install(&self, version: &str, dir: &Path) -> Result<PathBuf, InstallerError>;
}

/// Executable file name on this platform.
pub fn executable_name() -> &'static str {
    if cfg!(windows) {
        "terraform.exe"
    } else {
        "terraform"
    }
}
