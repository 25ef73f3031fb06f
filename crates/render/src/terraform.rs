// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `terraform` settings block: required providers and backend.

use crate::value::{is_identifier, parse_inputs, quote, set_inputs};
use crate::writer::{Block, Body, Expr};
use crate::RenderError;
use krec_core::{BackendSpec, ProviderSpec};

fn required_providers(providers: &[ProviderSpec]) -> Result<Option<Block>, RenderError> {
    if providers.is_empty() {
        return Ok(None);
    }

    let mut block = Block::new("required_providers", &[]);
    for provider in providers {
        if !is_identifier(&provider.name) {
            return Err(RenderError::InvalidName {
                what: "provider",
                name: provider.name.clone(),
            });
        }
        block.body.attribute(
            provider.name.clone(),
            Expr::Object(vec![
                ("source".to_string(), Expr::Raw(quote(&provider.source))),
                ("version".to_string(), Expr::Raw(quote(&provider.version))),
            ]),
        );
    }
    Ok(Some(block))
}

fn backend(spec: &BackendSpec) -> Result<Block, RenderError> {
    let mut block = Block::new("backend", &[&spec.kind]);
    if let Some(raw) = &spec.inputs {
        let inputs = parse_inputs(raw, "backend")?;
        set_inputs(&mut block.body, &inputs, "backend")?;
    }
    Ok(block)
}

pub(crate) fn append(
    doc: &mut Body,
    providers: &[ProviderSpec],
    backend_spec: &BackendSpec,
) -> Result<(), RenderError> {
    let mut terraform = Block::new("terraform", &[]);
    if let Some(block) = required_providers(providers)? {
        terraform.body.block(block);
    }
    terraform.body.block(backend(backend_spec)?);
    doc.block(terraform);
    Ok(())
}
