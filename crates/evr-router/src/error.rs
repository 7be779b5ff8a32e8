// SPDX-License-Identifier: MIT

//! Internal, `thiserror`-derived error type for router-construction-time
//! failures (YAML parsing, pattern compilation), distinct from the
//! wire-visible [`evr_core::ErrorKind`] taxonomy produced during dispatch.
//!
//! Follows the per-crate `Error` enum convention used throughout the
//! workspace: one `thiserror` enum per crate, never a bare `String`.

use evr_core::ErrorKind;
use serde_json::Value;

/// Failures that can occur wiring up the router itself, as opposed to
/// failures that occur *during* an emission (those are [`ErrorKind`]s
/// folded into a result list, never propagated as a `RouterError`).
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("invalid transformer pattern: {0}")]
    InvalidPattern(#[from] evr_core::pattern::PatternError),

    #[error("invalid transformer YAML: {0}")]
    InvalidYaml(#[from] serde_yaml::Error),

    #[error("transformer rule is missing required field: {0}")]
    MissingField(&'static str),

    #[error("unknown transformer id")]
    UnknownTransformer,

    #[error("unknown task name")]
    UnknownTask,
}

/// Render an [`ErrorKind`] as the wire-shape error object the transport
/// contract (§6/§7) promises: `{"error": <code>, "detail": <detail?>}`.
///
/// `ErrorKind`'s own `Serialize` impl produces a `{"code", "message"}`
/// pair for embedding inside other structures (e.g. discovery metadata);
/// this is the distinct top-level response shape clients actually parse.
pub fn wire_error(kind: &ErrorKind) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert("error".to_string(), Value::String(kind.code().to_string()));
    if let Some(detail) = kind.detail() {
        obj.insert("detail".to_string(), Value::String(detail.to_string()));
    }
    Value::Object(obj)
}

/// Render an [`ErrorKind`] the spec marks informational rather than a
/// failure (currently only `filter_rejected`, §7) as a `{"status":
/// <code>, "detail": <detail?>}` result entry — deliberately not
/// [`wire_error`]'s `{"error": ...}` shape, so a caller scanning results
/// for `error` fields doesn't mistake "this handler was skipped" for
/// "this handler failed".
pub fn wire_info(kind: &ErrorKind) -> Value {
    let mut obj = serde_json::Map::new();
    obj.insert("status".to_string(), Value::String(kind.code().to_string()));
    if let Some(detail) = kind.detail() {
        obj.insert("detail".to_string(), Value::String(detail.to_string()));
    }
    Value::Object(obj)
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
