// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `module` block and the root outputs forwarded from it.

use crate::value::{is_identifier, parse_inputs, quote, set_inputs};
use crate::writer::{Block, Body, Expr};
use crate::RenderError;
use krec_core::ModuleSpec;

pub(crate) fn append(doc: &mut Body, module: &ModuleSpec) -> Result<(), RenderError> {
    if !is_identifier(&module.name) {
        return Err(RenderError::InvalidName {
            what: "module",
            name: module.name.clone(),
        });
    }

    let mut block = Block::new("module", &[&module.name]);
    block.body.attribute("source", Expr::Raw(quote(&module.source)));
    if !module.version.is_empty() {
        block
            .body
            .attribute("version", Expr::Raw(quote(&module.version)));
    }
    if let Some(raw) = &module.inputs {
        let inputs = parse_inputs(raw, "module")?;
        set_inputs(&mut block.body, &inputs, "module")?;
    }
    doc.block(block);

    for output in &module.outputs {
        if !output.value.split('.').all(is_identifier) {
            return Err(RenderError::InvalidName {
                what: "module output value",
                name: output.value.clone(),
            });
        }
        let mut block = Block::new("output", &[&output.name]);
        block.body.attribute(
            "value",
            Expr::Raw(format!("module.{}.{}", module.name, output.value)),
        );
        doc.block(block);
    }
    Ok(())
}
