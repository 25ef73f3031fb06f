// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-workspace working directories

use krec_core::ResourceId;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Terraform CLI configuration written from the workspace's `tfRc`.
pub const CLI_CONFIG_FILE: &str = ".terraformrc";

#[derive(Debug, Error)]
pub enum WorkdirError {
    #[error("refusing to use {} as the workspace root", path.display())]
    UnsafeRoot { path: PathBuf },
    #[error("resource name component {0:?} cannot be used as a directory")]
    InvalidComponent(String),
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Allocates `<root>/<namespace>/<name>` directories.
#[derive(Debug, Clone)]
pub struct WorkDirs {
    root: PathBuf,
}

impl WorkDirs {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, WorkdirError> {
        let root = root.into();
        let unsafe_root = root.as_os_str().is_empty()
            || root
                .components()
                .all(|c| matches!(c, Component::RootDir | Component::CurDir | Component::Prefix(_)));
        if unsafe_root {
            return Err(WorkdirError::UnsafeRoot { path: root });
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: &ResourceId) -> Result<PathBuf, WorkdirError> {
        check_component(&id.namespace)?;
        check_component(&id.name)?;
        Ok(self.root.join(&id.namespace).join(&id.name))
    }

    /// Create the directory and (re)write or remove the CLI config file.
    pub fn prepare(&self, id: &ResourceId, tf_rc: Option<&str>) -> Result<WorkDir, WorkdirError> {
        let path = self.path_for(id)?;
        std::fs::create_dir_all(&path).map_err(|source| WorkdirError::Io {
            path: path.clone(),
            source,
        })?;

        let rc = path.join(CLI_CONFIG_FILE);
        let cli_config = match tf_rc {
            Some(contents) => {
                std::fs::write(&rc, contents).map_err(|source| WorkdirError::Io {
                    path: rc.clone(),
                    source,
                })?;
                Some(rc)
            }
            None => {
                if rc.exists() {
                    std::fs::remove_file(&rc).map_err(|source| WorkdirError::Io {
                        path: rc.clone(),
                        source,
                    })?;
                }
                None
            }
        };
        Ok(WorkDir { path, cli_config })
    }

    /// Remove a workspace's directory. Missing directories are fine.
    pub fn remove(&self, id: &ResourceId) -> Result<(), WorkdirError> {
        let path = self.path_for(id)?;
        match std::fs::remove_dir_all(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(WorkdirError::Io { path, source }),
        }
    }
}

/// A prepared working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDir {
    pub path: PathBuf,
    pub cli_config: Option<PathBuf>,
}

impl WorkDir {
    /// Variables pointing terraform at this directory's configuration.
    pub fn env(&self) -> Vec<(String, String)> {
        self.cli_config
            .iter()
            .map(|rc| ("TF_CLI_CONFIG_FILE".to_string(), rc.display().to_string()))
            .collect()
    }
}

fn check_component(s: &str) -> Result<(), WorkdirError> {
    if s.is_empty() || s == "." || s == ".." || s.contains('/') || s.contains('\\') {
        return Err(WorkdirError::InvalidComponent(s.to_string()));
    }
    Ok(())
}

#[cfg(test)]
#[path = "workdir_tests.rs"]
mod tests;
