// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Environment handed to terraform and credential file lifetime

use super::*;
use crate::env_resolver::{ROLE_ARN_VAR, TOKEN_FILE_VAR};
use krec_core::{EnvVar, EnvVarSource, KeySelector};
use std::collections::BTreeMap;

const ROLE: &str = "arn:aws:iam::123456789012:role/terraform";

fn federated(ctx: &TestContext) -> ResourceId {
    ctx.memory.add_service_account("default", "terraform");
    ctx.create(
        WorkspaceBuilder::new("default", "vpc")
            .aws_auth("terraform", ROLE)
            .build(),
    )
}

fn token_files(ctx: &TestContext) -> usize {
    std::fs::read_dir(ctx.token_dir()).unwrap().count()
}

#[tokio::test]
async fn token_file_exists_only_during_the_pass() {
    let ctx = setup();
    let id = federated(&ctx);

    ctx.converge(&id).await;

    let calls = ctx.terraform.calls();
    assert!(!calls.is_empty());
    for call in &calls {
        assert_eq!(call.env_value(ROLE_ARN_VAR), Some(ROLE));
        assert!(call
            .token_file_contents
            .as_deref()
            .is_some_and(|t| t.starts_with("token.default.terraform.")));
    }
    assert_eq!(token_files(&ctx), 0);
}

#[tokio::test]
async fn token_file_is_removed_when_the_pass_fails() {
    let ctx = setup();
    let id = federated(&ctx);
    ctx.converge(&id).await;
    ctx.memory.apply(
        WorkspaceBuilder::new("default", "vpc")
            .aws_auth("terraform", ROLE)
            .auto_apply(true)
            .build(),
    );
    ctx.terraform.fail(TerraformVerb::Plan, "Error: No valid credential sources found");

    assert!(ctx.reconcile(&id).await.is_err());

    let plan = ctx
        .terraform
        .calls()
        .into_iter()
        .rfind(|c| c.verb == TerraformVerb::Plan)
        .unwrap();
    assert!(plan.token_file_contents.is_some());
    assert_eq!(token_files(&ctx), 0);
}

#[tokio::test]
async fn each_pass_gets_a_fresh_token() {
    let ctx = setup();
    let id = federated(&ctx);

    ctx.converge(&id).await;

    assert_eq!(ctx.memory.token_requests().len(), 2);
    let files: std::collections::BTreeSet<_> = ctx
        .terraform
        .calls()
        .iter()
        .filter_map(|c| c.env_value(TOKEN_FILE_VAR).map(str::to_string))
        .collect();
    assert_eq!(files.len(), 2);
}

#[tokio::test]
async fn config_and_secret_values_reach_terraform() {
    let ctx = setup();
    ctx.memory.put_config_map(
        "default",
        "aws",
        BTreeMap::from([("region".to_string(), "eu-north-1".to_string())]),
    );
    ctx.memory.put_secret(
        "default",
        "github",
        BTreeMap::from([("token".to_string(), b"ghp_123".to_vec())]),
    );
    let id = ctx.create(
        WorkspaceBuilder::new("default", "vpc")
            .env(EnvVar::literal("TF_LOG", "warn"))
            .env(EnvVar {
                name: "AWS_REGION".to_string(),
                value: None,
                value_from: Some(EnvVarSource {
                    config_map_key_ref: Some(KeySelector {
                        name: "aws".to_string(),
                        key: "region".to_string(),
                    }),
                    secret_key_ref: None,
                }),
            })
            .env(EnvVar {
                name: "GITHUB_TOKEN".to_string(),
                value: None,
                value_from: Some(EnvVarSource {
                    config_map_key_ref: None,
                    secret_key_ref: Some(KeySelector {
                        name: "github".to_string(),
                        key: "token".to_string(),
                    }),
                }),
            })
            .build(),
    );

    ctx.reconcile(&id).await.unwrap();

    let call = &ctx.terraform.calls()[0];
    assert_eq!(call.env_value("TF_LOG"), Some("warn"));
    assert_eq!(call.env_value("AWS_REGION"), Some("eu-north-1"));
    assert_eq!(call.env_value("GITHUB_TOKEN"), Some("ghp_123"));
}

#[tokio::test]
async fn missing_reference_aborts_before_any_terraform_call() {
    let ctx = setup();
    let id = ctx.create(
        WorkspaceBuilder::new("default", "vpc")
            .env(EnvVar {
                name: "GITHUB_TOKEN".to_string(),
                value: None,
                value_from: Some(EnvVarSource {
                    config_map_key_ref: None,
                    secret_key_ref: Some(KeySelector {
                        name: "github".to_string(),
                        key: "token".to_string(),
                    }),
                }),
            })
            .build(),
    );

    let err = ctx.reconcile(&id).await.unwrap_err();

    assert_eq!(err.step, Step::Environment);
    assert!(ctx.terraform.calls().is_empty());
    assert!(ctx.store.writes().is_empty());
}

#[tokio::test]
async fn cli_config_is_written_and_exported() {
    let ctx = setup();
    let rc = "provider_installation {\n  direct {}\n}\n";
    let id = ctx.create(WorkspaceBuilder::new("default", "vpc").tf_rc(rc).build());

    ctx.reconcile(&id).await.unwrap();

    let path = ctx
        .workspace_root()
        .join("default")
        .join("vpc")
        .join(crate::workdir::CLI_CONFIG_FILE);
    assert_eq!(std::fs::read_to_string(&path).unwrap(), rc);
    let call = &ctx.terraform.calls()[0];
    assert_eq!(
        call.env_value("TF_CLI_CONFIG_FILE"),
        Some(path.display().to_string().as_str())
    );
}

#[tokio::test]
async fn workspace_cannot_override_the_plugin_cache() {
    let ctx = setup();
    let id = ctx.create(
        WorkspaceBuilder::new("default", "vpc")
            .env(EnvVar::literal(PLUGIN_CACHE_VAR, "/tmp/elsewhere"))
            .build(),
    );

    ctx.reconcile(&id).await.unwrap();

    let call = &ctx.terraform.calls()[0];
    let values: Vec<_> = call
        .env
        .iter()
        .filter(|(k, _)| k == PLUGIN_CACHE_VAR)
        .collect();
    assert_eq!(values.len(), 1);
    assert_ne!(values[0].1, "/tmp/elsewhere");
}
