// SPDX-License-Identifier: MIT

//! Stable, wire-visible error codes.
//!
//! [`ErrorKind`] is the taxonomy that crosses the socket boundary: every
//! value returned to a client in an error response carries one of these
//! codes, rendered through [`ErrorKind`]'s `Display` impl rather than
//! `Debug`, so the wire string never drifts when a variant is renamed.

use std::fmt;

/// Convenience alias for fallible router operations that produce a
/// wire-visible [`ErrorKind`] on failure.
pub type RouterResult<T> = Result<T, ErrorKind>;

/// Stable error codes surfaced to clients over the transport.
///
/// Renaming a variant does not change its wire string — see `code()`
/// below. Adding a new kind is backward compatible; removing or
/// repurposing one is not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A handler raised during dispatch (`catch` mode only; `propagate`
    /// mode aborts the emission instead of producing this).
    HandlerError(String),
    /// A handler's filter predicate returned false for this event; the
    /// handler was skipped. Informational, not a failure (§7) — `evr-
    /// router` renders this as a `{"status": ...}` result entry, never
    /// the `{"error": ...}` shape other kinds get.
    FilterRejected(String),
    /// A transformer's mapping or condition evaluation failed.
    TransformError(String),
    /// A transformer chain revisited an event name already on its own
    /// evaluation stack.
    CyclicTransform(String),
    /// An async transformer's correlated response did not arrive before
    /// its TTL elapsed.
    Timeout,
    /// An incoming frame exceeded `KSI_MAX_FRAME_BYTES`; the connection
    /// is closed after this is reported.
    FrameTooLarge,
    /// A frame did not deserialize into valid JSON.
    ParseError(String),
    /// A frame parsed as JSON but carried no `event` field.
    MissingEvent,
    /// `emit_first` found no handler or transformer for the event.
    NotFound,
    /// A `start_task` call named a task that is already running, without
    /// the explicit replace flag (I4).
    TaskConflict(String),
    /// `emit` was called after the shutdown coordinator entered its
    /// terminal phase (I5).
    ShuttingDown,
    /// Any failure that should never be reachable in a correctly
    /// configured router — panics caught at a task boundary, I/O errors
    /// in the transport, and the like.
    Internal(String),
}

impl ErrorKind {
    /// The stable string code for this kind, as it appears on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::HandlerError(_) => "handler_error",
            ErrorKind::FilterRejected(_) => "filter_rejected",
            ErrorKind::TransformError(_) => "transform_error",
            ErrorKind::CyclicTransform(_) => "cyclic_transform",
            ErrorKind::Timeout => "timeout",
            ErrorKind::FrameTooLarge => "frame_too_large",
            ErrorKind::ParseError(_) => "parse_error",
            ErrorKind::MissingEvent => "missing_event",
            ErrorKind::NotFound => "not_found",
            ErrorKind::TaskConflict(_) => "task_conflict",
            ErrorKind::ShuttingDown => "shutting_down",
            ErrorKind::Internal(_) => "internal_error",
        }
    }

    /// The human-readable detail carried alongside the code, if any.
    pub fn detail(&self) -> Option<&str> {
        match self {
            ErrorKind::HandlerError(m)
            | ErrorKind::FilterRejected(m)
            | ErrorKind::TransformError(m)
            | ErrorKind::CyclicTransform(m)
            | ErrorKind::ParseError(m)
            | ErrorKind::TaskConflict(m)
            | ErrorKind::Internal(m) => Some(m),
            ErrorKind::Timeout
            | ErrorKind::FrameTooLarge
            | ErrorKind::MissingEvent
            | ErrorKind::NotFound
            | ErrorKind::ShuttingDown => None,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {}", self.code(), detail),
            None => f.write_str(self.code()),
        }
    }
}

impl serde::Serialize for ErrorKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("ErrorKind", 2)?;
        s.serialize_field("code", self.code())?;
        s.serialize_field("message", &self.detail().unwrap_or(self.code()))?;
        s.end()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
