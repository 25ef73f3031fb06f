// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! JSON input values to HCL expressions.

use crate::writer::{Body, Expr};
use crate::RenderError;
use krec_core::RawJson;
use serde_json::{Map, Number, Value};

/// Quote a string as an HCL string literal, escaping template sequences.
pub(crate) fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '$' | '%' if chars.peek() == Some(&'{') => {
                out.push(c);
                out.push(c);
            }
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// HCL identifier: a letter or underscore, then letters, digits, `_` or `-`.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '-')
}

fn format_number(n: &Number) -> String {
    if let Some(i) = n.as_i64() {
        i.to_string()
    } else if let Some(u) = n.as_u64() {
        u.to_string()
    } else {
        // f64 Display drops a trailing ".0"
        n.as_f64().map(|f| f.to_string()).unwrap_or_else(|| n.to_string())
    }
}

/// Convert a JSON value. `null` has no HCL counterpart and yields `None`.
pub(crate) fn to_expr(value: &Value) -> Option<Expr> {
    match value {
        Value::String(s) => Some(Expr::Raw(quote(s))),
        Value::Number(n) => Some(Expr::Raw(format_number(n))),
        Value::Bool(b) => Some(Expr::Raw(b.to_string())),
        Value::Object(map) => Some(Expr::Object(
            sorted(map)
                .filter_map(|(key, value)| {
                    let key = if is_identifier(key) {
                        key.clone()
                    } else {
                        quote(key)
                    };
                    to_expr(value).map(|expr| (key, expr))
                })
                .collect(),
        )),
        Value::Array(items) => Some(Expr::List(items.iter().filter_map(to_expr).collect())),
        Value::Null => None,
    }
}

fn sorted(map: &Map<String, Value>) -> impl Iterator<Item = (&String, &Value)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter()
}

/// Parse an opaque input document into a key-sorted object.
pub(crate) fn parse_inputs(
    raw: &RawJson,
    field: &'static str,
) -> Result<Map<String, Value>, RenderError> {
    let value = raw
        .parse()
        .map_err(|source| RenderError::MalformedInputs { field, source })?;
    match value {
        Value::Object(map) => Ok(map),
        other => Err(RenderError::InputsNotObject {
            field,
            kind: kind_name(&other),
        }),
    }
}

fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// Set every input as an attribute on `body`, in key order.
pub(crate) fn set_inputs(
    body: &mut Body,
    inputs: &Map<String, Value>,
    field: &'static str,
) -> Result<(), RenderError> {
    for (key, value) in sorted(inputs) {
        if !is_identifier(key) {
            return Err(RenderError::InvalidName {
                what: field,
                name: key.clone(),
            });
        }
        match to_expr(value) {
            Some(expr) => body.attribute(key.clone(), expr),
            None => tracing::debug!(field, key = key.as_str(), "dropping null input"),
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod tests;
