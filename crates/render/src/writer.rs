// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Minimal HCL document model and formatter.
//!
//! Formatting follows `hclwrite`: two-space indentation, `=` aligned across
//! runs of consecutive single-line attributes, multi-line values and nested
//! blocks end a run, and empty blocks keep their braces on separate lines.

/// An expression on the right-hand side of an attribute.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Expr {
    /// Token text that fits on one line (string literal, number, bool, traversal)
    Raw(String),
    /// Key/value pairs; keys are already identifier-safe or quoted
    Object(Vec<(String, Expr)>),
    List(Vec<Expr>),
}

impl Expr {
    fn is_single_line(&self) -> bool {
        match self {
            Expr::Raw(_) => true,
            Expr::Object(entries) => entries.is_empty(),
            Expr::List(items) => items.iter().all(Expr::is_single_line),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Item {
    Attribute { name: String, expr: Expr },
    Block(Block),
}

/// Ordered body of attributes and blocks.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Body {
    items: Vec<Item>,
}

impl Body {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attribute(&mut self, name: impl Into<String>, expr: Expr) {
        self.items.push(Item::Attribute {
            name: name.into(),
            expr,
        });
    }

    pub(crate) fn block(&mut self, block: Block) {
        self.items.push(Item::Block(block));
    }

    pub(crate) fn to_text(&self) -> String {
        let mut out = String::new();
        self.write(&mut out, 0);
        out
    }

    fn write(&self, out: &mut String, depth: usize) {
        let mut run: Vec<(&str, &Expr)> = Vec::new();
        for item in &self.items {
            match item {
                Item::Attribute { name, expr } if expr.is_single_line() => {
                    run.push((name, expr));
                }
                Item::Attribute { name, expr } => {
                    flush_run(&mut run, out, depth);
                    indent(out, depth);
                    out.push_str(name);
                    out.push_str(" = ");
                    write_expr(expr, out, depth);
                    out.push('\n');
                }
                Item::Block(block) => {
                    flush_run(&mut run, out, depth);
                    block.write(out, depth);
                }
            }
        }
        flush_run(&mut run, out, depth);
    }
}

/// A block with a type, labels and a body.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Block {
    kind: String,
    labels: Vec<String>,
    pub(crate) body: Body,
}

impl Block {
    /// Labels are given unquoted; they are written as string literals.
    pub(crate) fn new(kind: impl Into<String>, labels: &[&str]) -> Self {
        Self {
            kind: kind.into(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            body: Body::new(),
        }
    }

    fn write(&self, out: &mut String, depth: usize) {
        indent(out, depth);
        out.push_str(&self.kind);
        for label in &self.labels {
            out.push(' ');
            out.push_str(&crate::value::quote(label));
        }
        out.push_str(" {\n");
        self.body.write(out, depth + 1);
        indent(out, depth);
        out.push_str("}\n");
    }
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn flush_run(run: &mut Vec<(&str, &Expr)>, out: &mut String, depth: usize) {
    let width = run.iter().map(|(name, _)| name.chars().count()).max().unwrap_or(0);
    for (name, expr) in run.drain(..) {
        indent(out, depth);
        out.push_str(name);
        for _ in name.chars().count()..width {
            out.push(' ');
        }
        out.push_str(" = ");
        write_expr(expr, out, depth);
        out.push('\n');
    }
}

/// Write an expression starting mid-line; multi-line forms close at `depth`.
fn write_expr(expr: &Expr, out: &mut String, depth: usize) {
    match expr {
        Expr::Raw(text) => out.push_str(text),
        Expr::Object(entries) if entries.is_empty() => out.push_str("{}"),
        Expr::Object(entries) => {
            out.push_str("{\n");
            let mut inner = Body::new();
            for (key, value) in entries {
                inner.attribute(key.clone(), value.clone());
            }
            inner.write(out, depth + 1);
            indent(out, depth);
            out.push('}');
        }
        Expr::List(items) if expr.is_single_line() => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expr(item, out, depth);
            }
            out.push(']');
        }
        Expr::List(items) => {
            out.push_str("[\n");
            for item in items {
                indent(out, depth + 1);
                write_expr(item, out, depth + 1);
                out.push_str(",\n");
            }
            indent(out, depth);
            out.push(']');
        }
    }
}

#[cfg(test)]
#[path = "writer_tests.rs"]
mod tests;
