// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution environment resolution
//!
//! Turns a workspace's declared environment into concrete variables. Values
//! come from literals, config maps or secrets; any missing reference fails
//! the whole resolution. When the workspace carries an AWS auth block, a
//! service account token is exchanged and written to an owner-only temporary
//! file that lives exactly as long as the returned [`ResolvedEnv`].

use krec_adapters::{ReferenceStore, StoreError, WorkspaceStore};
use krec_core::{EnvVar, KeySelector, Workspace};
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;

/// Variable holding the federated token file path.
pub const TOKEN_FILE_VAR: &str = "AWS_WEB_IDENTITY_TOKEN_FILE";
/// Variable holding the role to assume.
pub const ROLE_ARN_VAR: &str = "AWS_ROLE_ARN";
/// Audience the exchanged token is bound to.
pub const TOKEN_AUDIENCE: &str = "sts.amazonaws.com";
/// Lifetime requested for exchanged tokens.
pub const TOKEN_VALIDITY: Duration = Duration::from_secs(600);

const STATIC_KEY_VARS: [&str; 2] = ["AWS_ACCESS_KEY_ID", "AWS_SECRET_ACCESS_KEY"];

/// Kind of object an environment variable points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    ConfigMap,
    Secret,
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReferenceKind::ConfigMap => f.write_str("config map"),
            ReferenceKind::Secret => f.write_str("secret"),
        }
    }
}

/// Errors from environment resolution
#[derive(Debug, Error)]
pub enum EnvError {
    #[error("env {var}: {kind} {name} not found")]
    ReferenceNotFound {
        var: String,
        kind: ReferenceKind,
        name: String,
    },
    #[error("env {var}: key {key} not found in {kind} {name}")]
    KeyNotFound {
        var: String,
        kind: ReferenceKind,
        name: String,
        key: String,
    },
    #[error("env {var}: secret {name} key {key} is not valid utf-8")]
    NotUtf8 {
        var: String,
        name: String,
        key: String,
    },
    #[error("env {0}: no value or source")]
    NoSource(String),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("cannot write token file: {0}")]
    TokenFile(#[source] std::io::Error),
}

/// A resolved environment. Owns the credential file, if any; dropping this
/// value deletes it.
#[derive(Debug, Default)]
pub struct ResolvedEnv {
    vars: Vec<(String, String)>,
    token_file: Option<NamedTempFile>,
}

impl ResolvedEnv {
    pub fn vars(&self) -> &[(String, String)] {
        &self.vars
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Path of the credential file while it exists.
    pub fn token_file(&self) -> Option<&Path> {
        self.token_file.as_ref().map(NamedTempFile::path)
    }

    fn set(&mut self, name: &str, value: String) {
        match self.vars.iter_mut().find(|(k, _)| k == name) {
            Some(entry) => entry.1 = value,
            None => self.vars.push((name.to_string(), value)),
        }
    }
}

/// Resolves workspace environments against the store.
#[derive(Clone)]
pub struct EnvResolver<S> {
    store: S,
    token_dir: Option<PathBuf>,
}

impl<S> EnvResolver<S>
where
    S: WorkspaceStore + ReferenceStore,
{
    pub fn new(store: S) -> Self {
        Self {
            store,
            token_dir: None,
        }
    }

    /// Create credential files in `dir` instead of the system temp directory.
    pub fn with_token_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.token_dir = Some(dir.into());
        self
    }

    pub async fn resolve(&self, workspace: &Workspace) -> Result<ResolvedEnv, EnvError> {
        let namespace = &workspace.metadata.namespace;
        let mut env = ResolvedEnv::default();
        for var in &workspace.spec.env {
            let value = self.value_of(namespace, var).await?;
            env.set(&var.name, value);
        }

        let Some(aws) = workspace.spec.aws_auth() else {
            return Ok(env);
        };
        if STATIC_KEY_VARS.iter().all(|k| env.get(k).is_some()) {
            tracing::warn!(
                resource = %workspace.id(),
                "static AWS keys present; skipping federated credential exchange"
            );
            return Ok(env);
        }

        let token = self
            .store
            .issue_token(
                namespace,
                &aws.service_account_name,
                TOKEN_AUDIENCE,
                TOKEN_VALIDITY,
            )
            .await?;
        let file = self.write_token(&token).map_err(EnvError::TokenFile)?;
        env.set(TOKEN_FILE_VAR, file.path().display().to_string());
        env.set(ROLE_ARN_VAR, aws.role_arn.clone());
        env.token_file = Some(file);
        tracing::debug!(
            resource = %workspace.id(),
            service_account = aws.service_account_name.as_str(),
            "federated credential issued"
        );
        Ok(env)
    }

    async fn value_of(&self, namespace: &str, var: &EnvVar) -> Result<String, EnvError> {
        if let Some(value) = &var.value {
            return Ok(value.clone());
        }
        let source = var
            .value_from
            .as_ref()
            .ok_or_else(|| EnvError::NoSource(var.name.clone()))?;

        if let Some(selector) = &source.config_map_key_ref {
            let data = self
                .store
                .config_map(namespace, &selector.name)
                .await?
                .ok_or_else(|| not_found(var, ReferenceKind::ConfigMap, selector))?;
            return data
                .get(&selector.key)
                .cloned()
                .ok_or_else(|| key_not_found(var, ReferenceKind::ConfigMap, selector));
        }
        if let Some(selector) = &source.secret_key_ref {
            let data = self
                .store
                .secret(namespace, &selector.name)
                .await?
                .ok_or_else(|| not_found(var, ReferenceKind::Secret, selector))?;
            let bytes = data
                .get(&selector.key)
                .ok_or_else(|| key_not_found(var, ReferenceKind::Secret, selector))?;
            return String::from_utf8(bytes.clone()).map_err(|_| EnvError::NotUtf8 {
                var: var.name.clone(),
                name: selector.name.clone(),
                key: selector.key.clone(),
            });
        }
        Err(EnvError::NoSource(var.name.clone()))
    }

    /// The file is removed if writing fails.
    fn write_token(&self, token: &str) -> std::io::Result<NamedTempFile> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("krec-token-");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o600));
        }
        let mut file = match &self.token_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };
        file.write_all(token.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

fn not_found(var: &EnvVar, kind: ReferenceKind, selector: &KeySelector) -> EnvError {
    EnvError::ReferenceNotFound {
        var: var.name.clone(),
        kind,
        name: selector.name.clone(),
    }
}

fn key_not_found(var: &EnvVar, kind: ReferenceKind, selector: &KeySelector) -> EnvError {
    EnvError::KeyNotFound {
        var: var.name.clone(),
        kind,
        name: selector.name.clone(),
        key: selector.key.clone(),
    }
}

#[cfg(test)]
#[path = "env_resolver_tests.rs"]
mod tests;
