// SPDX-License-Identifier: MIT

use super::*;
use serde_json::json;

#[test]
fn simple_numeric_comparison() {
    let expr = parse("priority > 5").unwrap();
    assert!(eval(&expr, &json!({"priority": 10})));
    assert!(!eval(&expr, &json!({"priority": 3})));
}

#[test]
fn absent_field_compares_as_null() {
    let expr = parse("priority == null").unwrap();
    assert!(eval(&expr, &json!({})));
}

#[test]
fn string_equality() {
    let expr = parse("status == \"done\"").unwrap();
    assert!(eval(&expr, &json!({"status": "done"})));
    assert!(!eval(&expr, &json!({"status": "pending"})));
}

#[test]
fn and_or_not_and_parens() {
    let expr = parse("(a == 1 and b == 2) or not c == 3").unwrap();
    assert!(eval(&expr, &json!({"a": 1, "b": 2, "c": 3})));
    assert!(eval(&expr, &json!({"a": 0, "b": 0, "c": 9})));
    assert!(!eval(&expr, &json!({"a": 0, "b": 0, "c": 3})));
}

#[test]
fn in_and_not_in_against_array() {
    let expr = parse("kind in [\"a\", \"b\"]").unwrap();
    assert!(eval(&expr, &json!({"kind": "a"})));
    assert!(!eval(&expr, &json!({"kind": "z"})));

    let expr = parse("kind not in [\"a\", \"b\"]").unwrap();
    assert!(eval(&expr, &json!({"kind": "z"})));
    assert!(!eval(&expr, &json!({"kind": "a"})));
}

#[test]
fn dotted_field_path() {
    let expr = parse("request.prompt == \"hi\"").unwrap();
    assert!(eval(&expr, &json!({"request": {"prompt": "hi"}})));
}

#[test]
fn ge_le_boundaries() {
    let expr = parse("n >= 5").unwrap();
    assert!(eval(&expr, &json!({"n": 5})));
    let expr = parse("n <= 5").unwrap();
    assert!(eval(&expr, &json!({"n": 5})));
}

#[test]
fn malformed_condition_is_an_error() {
    assert!(parse("priority >").is_err());
    assert!(parse("(priority > 5").is_err());
    assert!(parse("== 5").is_err());
}

#[test]
fn lookup_path_returns_none_for_missing() {
    assert!(lookup_path(&json!({"a": 1}), "b").is_none());
    assert!(lookup_path(&json!({"a": {"b": 2}}), "a.b").is_some());
}
