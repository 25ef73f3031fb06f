// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn target(dir: &std::path::Path, env: Vec<(String, String)>) -> TerraformTarget {
    TerraformTarget {
        executable: PathBuf::from("/opt/terraform/1.11.2/terraform"),
        working_dir: dir.to_path_buf(),
        env,
    }
}

#[tokio::test]
async fn records_calls_in_order() {
    let fake = FakeTerraformAdapter::new();
    let t = target(std::path::Path::new("/work/default/ws"), Vec::new());

    fake.init(&t).await.unwrap();
    assert!(fake.validate(&t).await.unwrap());
    assert!(!fake.plan(&t).await.unwrap().has_changes());

    assert_eq!(
        fake.verbs(),
        vec![TerraformVerb::Init, TerraformVerb::Validate, TerraformVerb::Plan]
    );
    assert_eq!(fake.calls()[0].working_dir, PathBuf::from("/work/default/ws"));
}

#[tokio::test]
async fn scripted_failure_persists_until_cleared() {
    let fake = FakeTerraformAdapter::new();
    let t = target(std::path::Path::new("/w"), Vec::new());
    fake.fail(TerraformVerb::Destroy, "Error: state locked");

    for _ in 0..2 {
        let err = fake.destroy(&t).await.unwrap_err();
        assert!(err.to_string().contains("state locked"));
    }
    fake.clear_failure(TerraformVerb::Destroy);
    assert!(fake.destroy(&t).await.is_ok());
    assert_eq!(fake.count(TerraformVerb::Destroy), 3);
}

#[tokio::test]
async fn captures_token_file_contents_at_call_time() {
    let dir = tempfile::tempdir().unwrap();
    let token = dir.path().join("token");
    std::fs::write(&token, "jwt").unwrap();

    let fake = FakeTerraformAdapter::new();
    let t = target(
        dir.path(),
        vec![(
            "AWS_WEB_IDENTITY_TOKEN_FILE".to_string(),
            token.display().to_string(),
        )],
    );
    fake.init(&t).await.unwrap();
    std::fs::remove_file(&token).unwrap();

    let call = &fake.calls()[0];
    assert_eq!(call.token_file_contents.as_deref(), Some("jwt"));
    assert!(call.env_value("AWS_WEB_IDENTITY_TOKEN_FILE").is_some());
}
