// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[yare::parameterized(
    plain        = { "my-bucket", r#""my-bucket""# },
    quote_char   = { r#"say "hi""#, r#""say \"hi\"""# },
    backslash    = { r"C:\tmp", r#""C:\\tmp""# },
    newline      = { "a\nb", r#""a\nb""# },
    interpolate  = { "${var.x}", r#""$${var.x}""# },
    directive    = { "%{if}", r#""%%{if}""# },
    lone_dollar  = { "cost $5", r#""cost $5""# },
    control      = { "\u{1}", r#""\u0001""# },
)]
fn quote_escapes(input: &str, expected: &str) {
    assert_eq!(quote(input), expected);
}

#[yare::parameterized(
    simple     = { "bucket", true },
    underscore = { "_private", true },
    dashed     = { "my-module", true },
    digits     = { "az2", true },
    leading_digit = { "2az", false },
    leading_dash  = { "-x", false },
    dotted     = { "a.b", false },
    space      = { "a b", false },
    empty      = { "", false },
)]
fn identifier_rules(input: &str, expected: bool) {
    assert_eq!(is_identifier(input), expected);
}

#[yare::parameterized(
    integer   = { json!(3), "3" },
    negative  = { json!(-7), "-7" },
    float     = { json!(1.5), "1.5" },
    whole_float = { json!(1000.0), "1000" },
    boolean   = { json!(true), "true" },
)]
fn scalar_exprs(value: Value, expected: &str) {
    assert_eq!(to_expr(&value), Some(Expr::Raw(expected.to_string())));
}

#[test]
fn null_is_dropped_everywhere() {
    assert_eq!(to_expr(&Value::Null), None);
    assert_eq!(
        to_expr(&json!([1, null, 2])),
        Some(Expr::List(vec![
            Expr::Raw("1".to_string()),
            Expr::Raw("2".to_string())
        ]))
    );
    assert_eq!(
        to_expr(&json!({ "a": null })),
        Some(Expr::Object(Vec::new()))
    );
}

#[test]
fn object_keys_are_sorted_and_quoted_when_needed() {
    let expr = to_expr(&json!({ "zone": "a", "Name tag": "x", "az": "b" })).unwrap();
    let Expr::Object(entries) = expr else {
        panic!("expected object");
    };
    let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["\"Name tag\"", "az", "zone"]);
}

#[test]
fn parse_inputs_rejects_malformed_json() {
    let err = parse_inputs(&RawJson::new("{\"bucket\":"), "backend").unwrap_err();
    assert!(matches!(err, RenderError::MalformedInputs { field: "backend", .. }));
}

#[test]
fn parse_inputs_rejects_non_objects() {
    let err = parse_inputs(&RawJson::new("[1, 2]"), "module").unwrap_err();
    assert!(matches!(
        err,
        RenderError::InputsNotObject { field: "module", kind: "list" }
    ));
}

#[test]
fn set_inputs_rejects_invalid_attribute_names() {
    let mut body = Body::new();
    let inputs = parse_inputs(&RawJson::new(r#"{"not valid": 1}"#), "module").unwrap();
    let err = set_inputs(&mut body, &inputs, "module").unwrap_err();
    assert!(matches!(err, RenderError::InvalidName { .. }));
}
