// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for use across crates.
//!
//! Gated behind `#[cfg(any(test, feature = "test-support"))]`.

use crate::{
    BackendSpec, EnvVar, ModuleSpec, ObjectMeta, ProviderSpec, RawJson, Workspace, WorkspaceSpec,
};

/// The s3 / aws / vpc-module workspace spec used throughout the tests.
pub fn sample_spec() -> WorkspaceSpec {
    WorkspaceSpec {
        terraform_version: "1.11.2".to_string(),
        backend: BackendSpec {
            kind: "s3".to_string(),
            inputs: Some(RawJson::new(r#"{"bucket": "my-bucket"}"#)),
        },
        provider_specs: vec![ProviderSpec {
            name: "aws".to_string(),
            source: "hashicorp/aws".to_string(),
            version: "1.0".to_string(),
        }],
        module: ModuleSpec {
            name: "my-module".to_string(),
            source: "terraform-aws-modules/vpc/aws".to_string(),
            version: "5.19.0".to_string(),
            inputs: None,
            outputs: Vec::new(),
        },
        env: Vec::new(),
        auto_apply: false,
        tf_rc: None,
        authentication: None,
    }
}

/// Rendered form of [`sample_spec`].
pub const SAMPLE_RENDER: &str = r#"terraform {
  required_providers {
    aws = {
      source  = "hashicorp/aws"
      version = "1.0"
    }
  }
  backend "s3" {
    bucket = "my-bucket"
  }
}
provider "aws" {
}
module "my-module" {
  source  = "terraform-aws-modules/vpc/aws"
  version = "5.19.0"
}
"#;

pub fn sample_workspace(namespace: &str, name: &str) -> Workspace {
    Workspace::new(ObjectMeta::new(namespace, name), sample_spec())
}

/// Builder-style tweaks over the sample workspace.
pub struct WorkspaceBuilder {
    workspace: Workspace,
}

impl WorkspaceBuilder {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            workspace: sample_workspace(namespace, name),
        }
    }

    pub fn auto_apply(mut self, auto_apply: bool) -> Self {
        self.workspace.spec.auto_apply = auto_apply;
        self
    }

    pub fn terraform_version(mut self, version: &str) -> Self {
        self.workspace.spec.terraform_version = version.to_string();
        self
    }

    pub fn env(mut self, var: EnvVar) -> Self {
        self.workspace.spec.env.push(var);
        self
    }

    pub fn module_inputs(mut self, raw: &str) -> Self {
        self.workspace.spec.module.inputs = Some(RawJson::new(raw));
        self
    }

    pub fn tf_rc(mut self, contents: &str) -> Self {
        self.workspace.spec.tf_rc = Some(contents.to_string());
        self
    }

    pub fn aws_auth(mut self, service_account: &str, role_arn: &str) -> Self {
        self.workspace.spec.authentication = Some(crate::AuthenticationSpec {
            aws: Some(crate::AwsAuth {
                service_account_name: service_account.to_string(),
                role_arn: role_arn.to_string(),
            }),
        });
        self
    }

    pub fn build(self) -> Workspace {
        self.workspace
    }
}
