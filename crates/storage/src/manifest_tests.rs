// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_workspace_manifest() {
    let text = r#"{
        "kind": "Workspace",
        "metadata": { "name": "vpc", "namespace": "infra" },
        "spec": {
            "terraformVersion": "1.11.2",
            "backend": { "type": "s3", "inputs": { "bucket": "my-bucket" } },
            "providerSpecs": [{ "name": "aws", "source": "hashicorp/aws", "version": "1.0" }],
            "module": { "name": "my-module", "source": "terraform-aws-modules/vpc/aws", "version": "5.19.0" },
            "autoApply": true
        }
    }"#;
    let manifest = Manifest::parse(text).unwrap();
    let Manifest::Workspace(ws) = &manifest else {
        panic!("expected workspace");
    };
    assert!(ws.spec.auto_apply);
    assert_eq!(
        ws.spec.backend.inputs.as_ref().unwrap().as_str(),
        r#"{ "bucket": "my-bucket" }"#
    );
    assert_eq!(
        manifest.key(),
        ManifestKey {
            kind: ManifestKind::Workspace,
            namespace: "infra".to_string(),
            name: "vpc".to_string(),
        }
    );
}

#[test]
fn namespace_defaults() {
    let text = r#"{ "kind": "ConfigMap", "metadata": { "name": "settings" }, "data": { "region": "eu-west-1" } }"#;
    let manifest = Manifest::parse(text).unwrap();
    assert_eq!(manifest.key().namespace, "default");
    let Manifest::ConfigMap { data, .. } = manifest else {
        panic!("expected config map");
    };
    assert_eq!(data["region"], "eu-west-1");
}

#[test]
fn secret_string_data_becomes_bytes() {
    let text = r#"{ "kind": "Secret", "metadata": { "name": "creds" }, "stringData": { "token": "abc" } }"#;
    let Manifest::Secret { data, .. } = Manifest::parse(text).unwrap() else {
        panic!("expected secret");
    };
    assert_eq!(data["token"], b"abc");
}

#[yare::parameterized(
    unknown_kind = { r#"{ "kind": "Pod", "metadata": { "name": "x" } }"# },
    missing_kind = { r#"{ "metadata": { "name": "x" } }"# },
    not_json     = { "kind: Workspace" },
)]
fn rejects_bad_manifests(text: &str) {
    assert!(Manifest::parse(text).is_err());
}
