// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Terraform configuration rendering for workspaces.
//!
//! Rendering is deterministic: the same spec always yields byte-identical
//! text, with input keys in lexicographic order.

mod module;
mod provider;
mod terraform;
mod value;
mod writer;

use krec_core::WorkspaceSpec;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File the rendered document is written to inside a working directory.
pub const DOCUMENT_FILE: &str = "main.tf";

/// Errors that can occur while rendering
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("{field} inputs are not valid JSON: {source}")]
    MalformedInputs {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("{field} inputs must be a JSON object, got {kind}")]
    InputsNotObject {
        field: &'static str,
        kind: &'static str,
    },
    #[error("invalid {what} name '{name}'")]
    InvalidName { what: &'static str, name: String },
    #[error("rendered document is not valid HCL: {0}")]
    Invalid(#[from] hcl::Error),
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Render a workspace spec into a Terraform configuration document.
pub fn render(spec: &WorkspaceSpec) -> Result<String, RenderError> {
    let mut doc = writer::Body::new();
    terraform::append(&mut doc, &spec.provider_specs, &spec.backend)?;
    provider::append(&mut doc, &spec.provider_specs);
    module::append(&mut doc, &spec.module)?;

    let text = doc.to_text();
    hcl::parse(&text)?;
    Ok(text)
}

/// Write a rendered document into `dir`, returning the file path.
pub fn write_document(dir: &Path, document: &str) -> Result<PathBuf, RenderError> {
    let path = dir.join(DOCUMENT_FILE);
    std::fs::write(&path, document).map_err(|source| RenderError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
