// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative object files.
//!
//! Each `*.json` file in the manifests directory holds one object with a
//! `kind` of `Workspace`, `ConfigMap` or `Secret`.

use krec_adapters::{ConfigData, SecretData};
use krec_core::{ObjectMeta, Workspace};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("cannot read manifest: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid manifest: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unknown manifest kind '{0}'")]
    UnknownKind(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ManifestKind {
    Workspace,
    ConfigMap,
    Secret,
}

/// Which object a manifest file declared.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ManifestKey {
    pub kind: ManifestKind,
    pub namespace: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Manifest {
    Workspace(Workspace),
    ConfigMap {
        metadata: ObjectMeta,
        data: ConfigData,
    },
    Secret {
        metadata: ObjectMeta,
        data: SecretData,
    },
}

#[derive(Deserialize)]
struct KindProbe {
    kind: String,
}

#[derive(Deserialize)]
struct ConfigMapManifest {
    metadata: ObjectMeta,
    #[serde(default)]
    data: ConfigData,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SecretManifest {
    metadata: ObjectMeta,
    #[serde(default)]
    string_data: BTreeMap<String, String>,
}

impl Manifest {
    /// Parse manifest text. The kind is read first so workspace inputs are
    /// deserialized straight from the text.
    pub fn parse(text: &str) -> Result<Self, ManifestError> {
        let probe: KindProbe = serde_json::from_str(text)?;
        match probe.kind.as_str() {
            "Workspace" => Ok(Manifest::Workspace(serde_json::from_str(text)?)),
            "ConfigMap" => {
                let m: ConfigMapManifest = serde_json::from_str(text)?;
                Ok(Manifest::ConfigMap {
                    metadata: m.metadata,
                    data: m.data,
                })
            }
            "Secret" => {
                let m: SecretManifest = serde_json::from_str(text)?;
                Ok(Manifest::Secret {
                    metadata: m.metadata,
                    data: m
                        .string_data
                        .into_iter()
                        .map(|(k, v)| (k, v.into_bytes()))
                        .collect(),
                })
            }
            other => Err(ManifestError::UnknownKind(other.to_string())),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn key(&self) -> ManifestKey {
        let (kind, meta) = match self {
            Manifest::Workspace(ws) => (ManifestKind::Workspace, &ws.metadata),
            Manifest::ConfigMap { metadata, .. } => (ManifestKind::ConfigMap, metadata),
            Manifest::Secret { metadata, .. } => (ManifestKind::Secret, metadata),
        };
        ManifestKey {
            kind,
            namespace: meta.namespace.clone(),
            name: meta.name.clone(),
        }
    }
}

#[cfg(test)]
#[path = "manifest_tests.rs"]
mod tests;
