// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon configuration: defaults, then an optional TOML file, then `KREC_*`
//! environment overrides.

use std::path::{Path, PathBuf};
use std::time::Duration;

use krec_adapters::installer::DEFAULT_RELEASES_URL;
use krec_adapters::subprocess::TERRAFORM_TIMEOUT;
use krec_engine::ControllerConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::env;

pub const CONFIG_FILE: &str = "config.toml";

/// Daemon configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/krec)
    pub state_dir: PathBuf,
    /// Directory of workspace, configmap and secret manifests
    pub manifests_path: PathBuf,
    /// Root of per-workspace working directories
    pub workspace_path: PathBuf,
    /// Root of the terraform executable cache
    pub install_path: PathBuf,
    /// Where federated token files are created
    pub token_path: PathBuf,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to daemon log file
    pub log_path: PathBuf,
    pub max_concurrent_reconciles: usize,
    pub poll_interval: Duration,
    /// Drift refresh period; `None` disables periodic re-planning
    pub refresh_interval: Option<Duration>,
    pub terraform_timeout: Duration,
    pub releases_url: String,
}

/// Optional overrides read from `config.toml`
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub manifests_path: Option<PathBuf>,
    pub workspace_path: Option<PathBuf>,
    pub install_path: Option<PathBuf>,
    pub max_concurrent_reconciles: Option<usize>,
    pub poll_interval_ms: Option<u64>,
    pub refresh_interval_secs: Option<u64>,
    pub terraform_timeout_secs: Option<u64>,
    pub releases_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine state directory")]
    NoStateDir,

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid value for {var}: {value:?}")]
    InvalidEnv { var: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration for the daemon from the environment.
    pub fn load() -> Result<Self, ConfigError> {
        let state_dir = env::state_dir()?;
        let mut config = Self::defaults(state_dir);

        let (path, explicit) = match env::config_path() {
            Some(path) => (path, true),
            None => (config.state_dir.join(CONFIG_FILE), false),
        };
        if let Some(file) = FileConfig::read(&path, explicit)? {
            config.apply_file(file);
        }
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Default layout under `state_dir`.
    pub fn defaults(state_dir: PathBuf) -> Self {
        Self {
            manifests_path: state_dir.join("manifests"),
            workspace_path: state_dir.join("workspaces"),
            install_path: state_dir.join("tools"),
            token_path: state_dir.join("tokens"),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            max_concurrent_reconciles: ControllerConfig::default().workers,
            poll_interval: ControllerConfig::default().poll_interval,
            refresh_interval: None,
            terraform_timeout: TERRAFORM_TIMEOUT,
            releases_url: DEFAULT_RELEASES_URL.to_string(),
            state_dir,
        }
    }

    pub fn apply_file(&mut self, file: FileConfig) {
        if let Some(path) = file.manifests_path {
            self.manifests_path = path;
        }
        if let Some(path) = file.workspace_path {
            self.workspace_path = path;
        }
        if let Some(path) = file.install_path {
            self.install_path = path;
        }
        if let Some(n) = file.max_concurrent_reconciles {
            self.max_concurrent_reconciles = n;
        }
        if let Some(ms) = file.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = file.refresh_interval_secs {
            self.refresh_interval = refresh(secs);
        }
        if let Some(secs) = file.terraform_timeout_secs {
            self.terraform_timeout = Duration::from_secs(secs);
        }
        if let Some(url) = file.releases_url {
            self.releases_url = url;
        }
    }

    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        if let Some(path) = env::var(env::MANIFESTS_PATH) {
            self.manifests_path = path.into();
        }
        if let Some(path) = env::var(env::WORKSPACE_PATH) {
            self.workspace_path = path.into();
        }
        if let Some(path) = env::var(env::INSTALL_PATH) {
            self.install_path = path.into();
        }
        if let Some(n) = env::parsed(env::MAX_CONCURRENT_RECONCILES)? {
            self.max_concurrent_reconciles = n;
        }
        if let Some(ms) = env::parsed(env::POLL_INTERVAL_MS)? {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(secs) = env::parsed(env::REFRESH_INTERVAL_SECS)? {
            self.refresh_interval = refresh(secs);
        }
        if let Some(secs) = env::parsed(env::TERRAFORM_TIMEOUT_SECS)? {
            self.terraform_timeout = Duration::from_secs(secs);
        }
        if let Some(url) = env::var(env::RELEASES_URL) {
            self.releases_url = url;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_concurrent_reconciles == 0 {
            return Err(ConfigError::InvalidValue(
                "max_concurrent_reconciles must be at least 1".to_string(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue(
                "poll interval must be positive".to_string(),
            ));
        }
        if self.terraform_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "terraform timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn controller(&self) -> ControllerConfig {
        ControllerConfig {
            workers: self.max_concurrent_reconciles,
            poll_interval: self.poll_interval,
            ..ControllerConfig::default()
        }
    }
}

/// Zero disables drift refresh.
fn refresh(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

impl FileConfig {
    /// Read `path`. A missing file is only an error when it was named
    /// explicitly.
    pub fn read(path: &Path, explicit: bool) -> Result<Option<Self>, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && !explicit => return Ok(None),
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        Ok(Some(toml::from_str(&text)?))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
