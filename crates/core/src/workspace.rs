// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace resource: desired Terraform configuration and observed status.
//!
//! The spec side is written by users; the status side is owned exclusively
//! by the reconciler.

use crate::resource::{ObjectMeta, ResourceId};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Finalizer recorded once real infrastructure may exist for a workspace.
pub const WORKSPACE_FINALIZER: &str = "tf-reconcile.lukaspj.io/finalizer";

/// Opaque JSON document kept as text.
///
/// Inputs are handed to the renderer untouched so a malformed payload
/// surfaces there as a typed error instead of being lost at load time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawJson(String);

impl RawJson {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn from_value(value: &serde_json::Value) -> Self {
        Self(value.to_string())
    }

    pub fn parse(&self) -> Result<serde_json::Value, serde_json::Error> {
        serde_json::from_str(&self.0)
    }
}

impl Serialize for RawJson {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let raw = serde_json::value::RawValue::from_string(self.0.clone())
            .map_err(serde::ser::Error::custom)?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for RawJson {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Box::<serde_json::value::RawValue>::deserialize(deserializer)?;
        Ok(Self(raw.get().to_string()))
    }
}

/// Terraform backend configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendSpec {
    /// Backend kind, e.g. `s3`, `gcs`, `local`
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<RawJson>,
}

/// A required provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderSpec {
    pub name: String,
    pub source: String,
    #[serde(default)]
    pub version: String,
}

/// An output exposed from the module as a root output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleOutput {
    pub name: String,
    /// Attribute of the module to expose, e.g. `vpc_id`
    pub value: String,
}

/// The module instantiated by the workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleSpec {
    pub name: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inputs: Option<RawJson>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outputs: Vec<ModuleOutput>,
}

/// Reference to one key of a named config map or secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeySelector {
    pub name: String,
    pub key: String,
}

/// Where an environment variable's value comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVarSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_map_key_ref: Option<KeySelector>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<KeySelector>,
}

/// An environment variable passed to terraform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvVar {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<EnvVarSource>,
}

impl EnvVar {
    pub fn literal(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            value_from: None,
        }
    }
}

/// Federated AWS identity: a service account token exchanged for a role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsAuth {
    pub service_account_name: String,
    pub role_arn: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AuthenticationSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aws: Option<AwsAuth>,
}

/// Desired state of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceSpec {
    pub terraform_version: String,
    pub backend: BackendSpec,
    #[serde(default)]
    pub provider_specs: Vec<ProviderSpec>,
    pub module: ModuleSpec,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env: Vec<EnvVar>,
    #[serde(default)]
    pub auto_apply: bool,
    /// Raw terraform CLI configuration file contents
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tf_rc: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication: Option<AuthenticationSpec>,
}

impl WorkspaceSpec {
    pub fn aws_auth(&self) -> Option<&AwsAuth> {
        self.authentication.as_ref().and_then(|a| a.aws.as_ref())
    }
}

/// Observed state of a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkspaceStatus {
    #[serde(default)]
    pub current_render: String,
    #[serde(default)]
    pub latest_plan: String,
    #[serde(default)]
    pub valid_render: bool,
    #[serde(default)]
    pub plan_has_changes: bool,
    #[serde(default)]
    pub observed_generation: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_refresh_timestamp_ms: Option<u64>,
}

/// Where a workspace is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Live,
    /// Marked for deletion; `finalized` is true while our finalizer is still held
    Deleting { finalized: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workspace {
    pub metadata: ObjectMeta,
    pub spec: WorkspaceSpec,
    #[serde(default)]
    pub status: WorkspaceStatus,
}

impl Workspace {
    pub fn new(metadata: ObjectMeta, spec: WorkspaceSpec) -> Self {
        Self {
            metadata,
            spec,
            status: WorkspaceStatus::default(),
        }
    }

    pub fn id(&self) -> ResourceId {
        self.metadata.id()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        if self.metadata.is_deleting() {
            Lifecycle::Deleting {
                finalized: self.metadata.has_finalizer(WORKSPACE_FINALIZER),
            }
        } else {
            Lifecycle::Live
        }
    }

    pub fn has_finalizer(&self) -> bool {
        self.metadata.has_finalizer(WORKSPACE_FINALIZER)
    }

    /// True when the current generation has been fully processed and no
    /// drift refresh is due at `now_ms`.
    pub fn is_up_to_date(&self, now_ms: u64) -> bool {
        if self.status.observed_generation != self.metadata.generation {
            return false;
        }
        match self.status.next_refresh_timestamp_ms {
            Some(due) => now_ms < due,
            None => true,
        }
    }
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
