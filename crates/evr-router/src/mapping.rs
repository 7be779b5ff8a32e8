// SPDX-License-Identifier: MIT

//! Transformer mapping evaluation (§4.3): `{{path}}` templates resolved
//! against input data, recursing through nested objects and arrays.

use crate::condition::lookup_path;
use serde_json::Value;

/// Apply a transformer's `mapping` to `data`, producing the target
/// event's data.
///
/// - A literal (non-string) JSON value passes through unchanged.
/// - A string consisting solely of one `{{path}}` substring preserves
///   the source value's type — numbers, objects, arrays stay as-is.
/// - Any other string is a "mixed" template: every `{{path}}` occurrence
///   is replaced by the stringified field value (missing → empty
///   string), and the result is always a JSON string.
/// - Objects and arrays in `mapping` recurse field-by-field.
pub fn apply(mapping: &Value, data: &Value) -> Value {
    match mapping {
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), apply(v, data));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| apply(v, data)).collect()),
        Value::String(s) => apply_template(s, data),
        other => other.clone(),
    }
}

fn apply_template(template: &str, data: &Value) -> Value {
    if let Some(path) = pure_template_path(template) {
        return lookup_path(data, path).cloned().unwrap_or(Value::Null);
    }
    Value::String(apply_string_template(template, data))
}

/// Resolve every `{{path}}` occurrence in `template` against `data`,
/// always producing a plain string (missing fields become `""`). Used
/// where the result must be a string regardless of template purity,
/// such as a transformer's target event name.
pub fn apply_string_template(template: &str, data: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let path = after[..end].trim();
                let value = lookup_path(data, path);
                out.push_str(&display_value(value));
                rest = &after[end + 2..];
            }
            None => {
                // Unterminated `{{`: treat the rest of the string literally.
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

/// If `template` is exactly one `{{path}}` with no surrounding text,
/// return the dotted path; otherwise `None`.
fn pure_template_path(template: &str) -> Option<&str> {
    let inner = template.strip_prefix("{{")?.strip_suffix("}}")?;
    if inner.contains("{{") || inner.contains("}}") {
        return None;
    }
    Some(inner.trim())
}

fn display_value(value: Option<&Value>) -> String {
    match value {
        None => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

#[cfg(test)]
#[path = "mapping_tests.rs"]
mod tests;
