// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

use crate::config::ConfigError;

pub const STATE_DIR: &str = "KREC_STATE_DIR";
pub const CONFIG: &str = "KREC_CONFIG";
pub const MANIFESTS_PATH: &str = "KREC_MANIFESTS_PATH";
pub const WORKSPACE_PATH: &str = "KREC_WORKSPACE_PATH";
pub const INSTALL_PATH: &str = "KREC_INSTALL_PATH";
pub const MAX_CONCURRENT_RECONCILES: &str = "KREC_MAX_CONCURRENT_RECONCILES";
pub const POLL_INTERVAL_MS: &str = "KREC_POLL_INTERVAL_MS";
pub const REFRESH_INTERVAL_SECS: &str = "KREC_REFRESH_INTERVAL_SECS";
pub const TERRAFORM_TIMEOUT_SECS: &str = "KREC_TERRAFORM_TIMEOUT_SECS";
pub const RELEASES_URL: &str = "KREC_RELEASES_URL";

/// Resolve state directory: KREC_STATE_DIR > XDG_STATE_HOME/krec > ~/.local/state/krec
pub fn state_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = var(STATE_DIR) {
        return Ok(PathBuf::from(dir));
    }
    if let Some(xdg) = var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("krec"));
    }
    let home = var("HOME").ok_or(ConfigError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/krec"))
}

/// Explicit config file path, if set.
pub fn config_path() -> Option<PathBuf> {
    var(CONFIG).map(PathBuf::from)
}

/// Non-empty value of `name`.
pub fn var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Parsed value of `name`; `None` when unset.
pub fn parsed<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match var(name) {
        None => Ok(None),
        Some(value) => value
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var: name, value }),
    }
}
