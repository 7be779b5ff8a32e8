// SPDX-License-Identifier: MIT

//! The wire envelope clients send, and the context the router builds
//! around it for the duration of a dispatch.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

crate::define_id! {
    /// Identifies one emission for async transformer response correlation.
    pub struct CorrelationId("cor-");
}

crate::define_id! {
    /// Identifies one connected transport client.
    pub struct ClientId("cli-");
}

/// The envelope as it arrives over the wire: `{"event": ..., "data": ...}`
/// plus the optional identity fields a client may supply.
///
/// `_meta` is never read from client input — [`Meta`] is always computed
/// server-side and merged into `data["_meta"]` before dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    pub event: String,
    #[serde(default)]
    pub data: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub originator_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub construct_id: Option<String>,
}

impl Envelope {
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
            correlation_id: None,
            originator_id: None,
            construct_id: None,
        }
    }
}

/// Metadata the router computes for an emission and merges into
/// `data["_meta"]` before any handler or transformer sees it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Meta {
    pub correlation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub originator_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub construct_id: Option<String>,
    pub depth: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    pub seq: u64,
    /// Wire-visible hint: true when a live cancellation token is attached
    /// to this emission's [`EmitContext`] in-process. JSON cannot carry
    /// a live token, so this is advisory only.
    pub cancellable: bool,
}

/// The in-process context threaded through one `emit` call and all of its
/// nested (handler-triggered) re-emissions.
#[derive(Debug, Clone)]
pub struct EmitContext {
    pub correlation_id: CorrelationId,
    pub originator_id: Option<String>,
    pub construct_id: Option<String>,
    pub depth: u32,
    pub client_id: Option<ClientId>,
    pub seq: u64,
    pub cancel: CancellationToken,
}

impl EmitContext {
    /// Build a fresh top-level context (depth 0) for a new emission.
    pub fn root(client_id: Option<ClientId>, seq: u64) -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            originator_id: None,
            construct_id: None,
            depth: 0,
            client_id,
            seq,
            cancel: CancellationToken::new(),
        }
    }

    /// Build the root context for one transport request, honoring a
    /// client-supplied correlation id (so callers can thread their own
    /// causal chain across separate top-level requests) instead of
    /// always minting a fresh one.
    pub fn from_request(
        client_id: Option<ClientId>,
        seq: u64,
        correlation_id: Option<&str>,
        originator_id: Option<String>,
        construct_id: Option<String>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.map(CorrelationId::from_string).unwrap_or_else(CorrelationId::new),
            originator_id,
            construct_id,
            depth: 0,
            client_id,
            seq,
            cancel: CancellationToken::new(),
        }
    }

    /// Derive the context for a handler-initiated nested emission (a
    /// handler calling back into the router), sharing the same
    /// correlation id and cancellation token as the parent so a
    /// client-initiated cancel propagates to every handler it triggered,
    /// transitively.
    ///
    /// Does *not* advance `depth` — §4.3 scopes the depth counter (and
    /// `_meta.depth`) to transformer re-emission specifically ("every
    /// emission carries a depth counter ... incremented on every
    /// transformer re-emission"); a handler recursing a few levels via
    /// `emit`/`emit_nested` is a distinct, unbounded-by-this-counter
    /// pattern (§2: "handlers may call C4.emit recursively"). Use
    /// [`EmitContext::nested_transform`] for transformer-chain
    /// re-emission instead.
    pub fn nested(&self) -> Self {
        Self {
            correlation_id: self.correlation_id,
            originator_id: self.originator_id.clone(),
            construct_id: self.construct_id.clone(),
            depth: self.depth,
            client_id: self.client_id,
            seq: self.seq,
            cancel: self.cancel.clone(),
        }
    }

    /// Derive the context for one more hop of a transformer chain,
    /// advancing `depth` (and therefore `_meta.depth`) by one — the
    /// counter [`crate::ErrorKind::CyclicTransform`] checks against (I2).
    pub fn nested_transform(&self) -> Self {
        Self { depth: self.depth + 1, ..self.nested() }
    }

    pub fn to_meta(&self) -> Meta {
        Meta {
            correlation_id: self.correlation_id.to_string(),
            originator_id: self.originator_id.clone(),
            construct_id: self.construct_id.clone(),
            depth: self.depth,
            client_id: self.client_id.map(|id| id.to_string()),
            seq: self.seq,
            cancellable: true,
        }
    }

    /// Merge this context's [`Meta`] into `data["_meta"]`, coercing `data`
    /// to an object first if it was not one.
    pub fn stamp(&self, mut data: Value) -> Value {
        if !data.is_object() {
            data = Value::Object(Default::default());
        }
        let meta = serde_json::to_value(self.to_meta()).unwrap_or(Value::Null);
        if let Value::Object(map) = &mut data {
            map.insert("_meta".to_string(), meta);
        }
        data
    }
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
