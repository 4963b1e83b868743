// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
//! Tool-argument validation against the JSON-Schema subset tools declare.
//!
//! Providers do not guarantee well-typed arguments: models emit `"42"` for a
//! number, `"true"` for a boolean, or drop required fields entirely.  The
//! validator clones the arguments (the caller's value is never mutated),
//! coerces obvious scalar mismatches, and collects every offending path so
//! the model gets one actionable error message rather than the first
//! failure.

use serde_json::{Map, Value};
use thiserror::Error;

/// Argument validation failure; the message enumerates the offending paths.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("invalid tool arguments: {}", problems.join("; "))]
pub struct ValidationError {
    pub problems: Vec<String>,
}

/// Validate `arguments` against `schema`, returning a coerced copy.
///
/// A schema that is not an object (or carries no recognized `type`) trusts
/// the arguments verbatim — the restricted-environment escape hatch.
pub fn validate_arguments(schema: &Value, arguments: &Value) -> Result<Value, ValidationError> {
    let mut coerced = arguments.clone();
    let mut problems = Vec::new();
    check(schema, &mut coerced, "$", &mut problems);
    if problems.is_empty() {
        Ok(coerced)
    } else {
        Err(ValidationError { problems })
    }
}

fn check(schema: &Value, value: &mut Value, path: &str, problems: &mut Vec<String>) {
    let Some(schema_obj) = schema.as_object() else {
        return; // unrecognized schema shape: trust verbatim
    };

    match schema_obj.get("type").and_then(Value::as_str) {
        Some("object") => check_object(schema_obj, value, path, problems),
        Some("array") => check_array(schema_obj, value, path, problems),
        Some("string") => coerce_string(value, path, problems),
        Some("number") => coerce_number(value, path, problems),
        Some("integer") => coerce_integer(value, path, problems),
        Some("boolean") => coerce_boolean(value, path, problems),
        _ => return, // no type constraint: trust verbatim
    }

    if let Some(allowed) = schema_obj.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            problems.push(format!("{path}: value {value} is not one of the allowed values"));
        }
    }
}

fn check_object(
    schema: &Map<String, Value>,
    value: &mut Value,
    path: &str,
    problems: &mut Vec<String>,
) {
    let Some(obj) = value.as_object_mut() else {
        problems.push(format!("{path}: expected an object"));
        return;
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !obj.contains_key(name) {
                problems.push(format!("{path}.{name}: missing required field"));
            }
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (name, subschema) in properties {
            if let Some(field) = obj.get_mut(name) {
                check(subschema, field, &format!("{path}.{name}"), problems);
            }
        }
        // Unknown extra fields pass through untouched.
    }
}

fn check_array(
    schema: &Map<String, Value>,
    value: &mut Value,
    path: &str,
    problems: &mut Vec<String>,
) {
    let Some(items) = value.as_array_mut() else {
        problems.push(format!("{path}: expected an array"));
        return;
    };
    if let Some(item_schema) = schema.get("items") {
        for (i, item) in items.iter_mut().enumerate() {
            check(item_schema, item, &format!("{path}[{i}]"), problems);
        }
    }
}

fn coerce_string(value: &mut Value, path: &str, problems: &mut Vec<String>) {
    match value {
        Value::String(_) => {}
        Value::Number(n) => *value = Value::String(n.to_string()),
        Value::Bool(b) => *value = Value::String(b.to_string()),
        _ => problems.push(format!("{path}: expected a string")),
    }
}

fn coerce_number(value: &mut Value, path: &str, problems: &mut Vec<String>) {
    match value {
        Value::Number(_) => {}
        Value::String(s) => match s.trim().parse::<f64>() {
            Ok(n) => match serde_json::Number::from_f64(n) {
                Some(n) => *value = Value::Number(n),
                None => problems.push(format!("{path}: {s:?} is not a finite number")),
            },
            Err(_) => problems.push(format!("{path}: expected a number, got {s:?}")),
        },
        _ => problems.push(format!("{path}: expected a number")),
    }
}

fn coerce_integer(value: &mut Value, path: &str, problems: &mut Vec<String>) {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => {}
        Value::Number(n) => problems.push(format!("{path}: expected an integer, got {n}")),
        Value::String(s) => match s.trim().parse::<i64>() {
            Ok(n) => *value = Value::Number(n.into()),
            Err(_) => problems.push(format!("{path}: expected an integer, got {s:?}")),
        },
        _ => problems.push(format!("{path}: expected an integer")),
    }
}

fn coerce_boolean(value: &mut Value, path: &str, problems: &mut Vec<String>) {
    match value {
        Value::Bool(_) => {}
        Value::String(s) => match s.trim() {
            "true" => *value = Value::Bool(true),
            "false" => *value = Value::Bool(false),
            other => problems.push(format!("{path}: expected a boolean, got {other:?}")),
        },
        _ => problems.push(format!("{path}: expected a boolean")),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string" },
                "limit": { "type": "integer" },
                "recursive": { "type": "boolean" },
                "mode": { "type": "string", "enum": ["fast", "full"] },
            },
            "required": ["path"],
        })
    }

    #[test]
    fn valid_arguments_pass_through() {
        let args = json!({"path": ".", "limit": 10});
        let out = validate_arguments(&schema(), &args).unwrap();
        assert_eq!(out, args);
    }

    #[test]
    fn string_number_coerces_to_integer() {
        let out = validate_arguments(&schema(), &json!({"path": ".", "limit": "42"})).unwrap();
        assert_eq!(out["limit"], json!(42));
    }

    #[test]
    fn string_bool_coerces() {
        let out =
            validate_arguments(&schema(), &json!({"path": ".", "recursive": "true"})).unwrap();
        assert_eq!(out["recursive"], json!(true));
    }

    #[test]
    fn number_coerces_to_string() {
        let out = validate_arguments(&schema(), &json!({"path": 42})).unwrap();
        assert_eq!(out["path"], json!("42"));
    }

    #[test]
    fn caller_arguments_are_not_mutated() {
        let args = json!({"path": ".", "limit": "42"});
        let _ = validate_arguments(&schema(), &args).unwrap();
        assert_eq!(args["limit"], json!("42"), "input must stay untouched");
    }

    #[test]
    fn missing_required_field_reported() {
        let err = validate_arguments(&schema(), &json!({"limit": 1})).unwrap_err();
        assert!(err.to_string().contains("$.path"));
        assert!(err.to_string().contains("missing required"));
    }

    #[test]
    fn all_offending_paths_enumerated() {
        let err = validate_arguments(
            &schema(),
            &json!({"limit": "not a number", "recursive": "maybe"}),
        )
        .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("$.path"), "missing required: {message}");
        assert!(message.contains("$.limit"), "bad integer: {message}");
        assert!(message.contains("$.recursive"), "bad boolean: {message}");
    }

    #[test]
    fn enum_violation_reported() {
        let err =
            validate_arguments(&schema(), &json!({"path": ".", "mode": "turbo"})).unwrap_err();
        assert!(err.to_string().contains("$.mode"));
    }

    #[test]
    fn enum_accepts_member() {
        let out = validate_arguments(&schema(), &json!({"path": ".", "mode": "fast"})).unwrap();
        assert_eq!(out["mode"], json!("fast"));
    }

    #[test]
    fn array_items_validated_with_index_paths() {
        let schema = json!({
            "type": "object",
            "properties": {
                "files": { "type": "array", "items": { "type": "string" } }
            }
        });
        let err =
            validate_arguments(&schema, &json!({"files": ["a.rs", ["nested"]]})).unwrap_err();
        assert!(err.to_string().contains("$.files[1]"));
    }

    #[test]
    fn non_object_arguments_rejected_for_object_schema() {
        let err = validate_arguments(&schema(), &json!("just a string")).unwrap_err();
        assert!(err.to_string().contains("expected an object"));
    }

    #[test]
    fn untyped_schema_trusts_arguments() {
        let out = validate_arguments(&json!({}), &json!({"anything": [1, 2]})).unwrap();
        assert_eq!(out, json!({"anything": [1, 2]}));
    }

    #[test]
    fn null_schema_trusts_arguments() {
        let out = validate_arguments(&Value::Null, &json!({"x": 1})).unwrap();
        assert_eq!(out, json!({"x": 1}));
    }

    #[test]
    fn fractional_number_is_not_an_integer() {
        let err = validate_arguments(&schema(), &json!({"path": ".", "limit": 1.5})).unwrap_err();
        assert!(err.to_string().contains("$.limit"));
    }
}
