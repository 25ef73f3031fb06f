// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared terraform executable cache
//!
//! Maps a requested version to a validated executable under
//! `<install_root>/<version>/`. Lookups take the read side of the index lock;
//! a miss takes the write side and checks again, so a burst of callers asking
//! for the same version triggers one install. A failed install leaves the
//! index untouched and the next caller retries.
//!
//! Provider plugins live in one `plugin-cache` directory shared by every
//! workspace. `terraform init` populates it and is not safe to run
//! concurrently against it, so all init calls go through [`ToolCache::init_lock`].

use krec_adapters::installer::executable_name;
use krec_adapters::{InstallerError, ToolInstaller};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard, RwLock};

/// Directory under the install root shared as `TF_PLUGIN_CACHE_DIR`.
pub const PLUGIN_CACHE_DIR: &str = "plugin-cache";

/// Errors from acquiring an executable
#[derive(Debug, Error)]
pub enum InstallError {
    #[error("invalid terraform version {0:?}")]
    InvalidVersion(String),
    #[error("terraform {version} install failed: {source}")]
    Failed {
        version: String,
        #[source]
        source: InstallerError,
    },
    #[error("terraform {version} install produced no executable at {}", path.display())]
    Missing { version: String, path: PathBuf },
    #[error("cannot prepare plugin cache {}: {source}", path.display())]
    PluginCache {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Version-keyed executable index over a [`ToolInstaller`]. Clones share state.
#[derive(Clone)]
pub struct ToolCache<I> {
    installer: I,
    install_root: PathBuf,
    index: Arc<RwLock<HashMap<String, PathBuf>>>,
    plugin_lock: Arc<Mutex<()>>,
}

impl<I: ToolInstaller> ToolCache<I> {
    pub fn new(installer: I, install_root: impl Into<PathBuf>) -> Self {
        Self {
            installer,
            install_root: install_root.into(),
            index: Arc::new(RwLock::new(HashMap::new())),
            plugin_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn install_root(&self) -> &Path {
        &self.install_root
    }

    /// Path of the executable for `version`, installing it on first use.
    pub async fn acquire(&self, version: &str) -> Result<PathBuf, InstallError> {
        validate_version(version)?;

        if let Some(path) = self.index.read().await.get(version) {
            return Ok(path.clone());
        }

        let mut index = self.index.write().await;
        if let Some(path) = index.get(version) {
            return Ok(path.clone());
        }

        let dir = self.install_root.join(version);
        let existing = dir.join(executable_name());
        let path = if existing.is_file() {
            tracing::debug!(version, path = %existing.display(), "reusing installed terraform");
            existing
        } else {
            self.installer
                .install(version, &dir)
                .await
                .map_err(|source| InstallError::Failed {
                    version: version.to_string(),
                    source,
                })?
        };

        if !path.is_file() {
            return Err(InstallError::Missing {
                version: version.to_string(),
                path,
            });
        }

        index.insert(version.to_string(), path.clone());
        Ok(path)
    }

    /// Shared plugin cache directory, created if missing.
    pub fn prepare_plugin_cache(&self) -> Result<PathBuf, InstallError> {
        let path = self.install_root.join(PLUGIN_CACHE_DIR);
        std::fs::create_dir_all(&path).map_err(|source| InstallError::PluginCache {
            path: path.clone(),
            source,
        })?;
        Ok(path)
    }

    /// Serializes every plugin-cache-populating call. The guard is released on
    /// drop, including when the holding future is cancelled.
    pub async fn init_lock(&self) -> MutexGuard<'_, ()> {
        self.plugin_lock.lock().await
    }

    /// Versions currently indexed.
    pub async fn cached_versions(&self) -> Vec<String> {
        let mut versions: Vec<_> = self.index.read().await.keys().cloned().collect();
        versions.sort();
        versions
    }
}

/// A version names a directory under the install root, so it must be a single
/// plain path component.
fn validate_version(version: &str) -> Result<(), InstallError> {
    let bad = version.is_empty()
        || version == "."
        || version.contains("..")
        || version.contains('/')
        || version.contains('\\')
        || version.chars().any(char::is_whitespace);
    if bad {
        return Err(InstallError::InvalidVersion(version.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "tool_cache_tests.rs"]
mod tests;
