// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource store interfaces
//!
//! The reconciler only ever talks to the store through these narrow traits.
//! Writes are optimistic: every object carries a `resource_version`, and a
//! write based on a stale version fails with [`StoreError::Conflict`].

use async_trait::async_trait;
use krec_core::{ResourceId, Workspace};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Contents of a config map.
pub type ConfigData = BTreeMap<String, String>;

/// Contents of a secret.
pub type SecretData = BTreeMap<String, Vec<u8>>;

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(ResourceId),
    #[error("conflict writing {resource}: stored version is {stored}, write was based on {given}")]
    Conflict {
        resource: ResourceId,
        stored: u64,
        given: u64,
    },
    #[error("token issuance for service account {namespace}/{name} failed: {message}")]
    TokenIssuance {
        namespace: String,
        name: String,
        message: String,
    },
    #[error("io error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid json in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Access to workspace objects.
#[async_trait]
pub trait WorkspaceStore: Clone + Send + Sync + 'static {
    /// Fetch a workspace; `None` when it does not exist.
    async fn get(&self, id: &ResourceId) -> Result<Option<Workspace>, StoreError>;

    /// All workspaces, ordered by identity.
    async fn list(&self) -> Result<Vec<Workspace>, StoreError>;

    /// Write metadata (finalizers) and spec. Returns the stored object.
    async fn update(&self, workspace: &Workspace) -> Result<Workspace, StoreError>;

    /// Write only the status sub-resource. Returns the stored object.
    async fn update_status(&self, workspace: &Workspace) -> Result<Workspace, StoreError>;

    /// Issue a short-lived identity token bound to a service account.
    async fn issue_token(
        &self,
        namespace: &str,
        service_account: &str,
        audience: &str,
        validity: Duration,
    ) -> Result<String, StoreError>;
}

/// Access to config maps and secrets referenced from workspace environments.
#[async_trait]
pub trait ReferenceStore: Clone + Send + Sync + 'static {
    async fn config_map(&self, namespace: &str, name: &str)
        -> Result<Option<ConfigData>, StoreError>;

    async fn secret(&self, namespace: &str, name: &str) -> Result<Option<SecretData>, StoreError>;
}
