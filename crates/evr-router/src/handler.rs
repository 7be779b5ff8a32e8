// SPDX-License-Identifier: MIT

//! The handler trait invoked by the router for a matching event.
//!
//! Handlers are async by construction — the `is_async` flag is
//! therefore tracked only as registration metadata (surfaced through
//! [`crate::discover`]) rather than as two code paths; every handler
//! runs on the same `tokio` executor the router itself is driven by.

use evr_core::{EmitContext, ErrorKind};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A boxed, type-erased future, the shape `async-trait` would generate.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Something the router can invoke for a matching event.
///
/// `call` receives the event's (already `_meta`-stamped) data and the
/// [`EmitContext`] for this dispatch, and returns either a JSON result
/// value or a wire-visible [`ErrorKind`] — the latter becomes a
/// `handler_error` (or propagates, in `propagate` mode).
#[async_trait::async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, data: Value, ctx: &EmitContext) -> Result<Value, ErrorKind>;
}

/// Adapt a plain async closure into a [`Handler`].
///
/// Follows the small-newtype-adapter-around-`Fn`-closures convention
/// used elsewhere in the workspace (e.g. `oj_adapters`'s notify
/// callbacks) rather than requiring every caller to hand-write a
/// struct + impl block.
pub struct HandlerFn<F>(pub F);

impl<F, Fut> HandlerFn<F>
where
    F: Fn(Value, &EmitContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ErrorKind>> + Send,
{
    pub fn new(f: F) -> Arc<Self> {
        Arc::new(Self(f))
    }
}

#[async_trait::async_trait]
impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(Value, &EmitContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, ErrorKind>> + Send,
{
    async fn call(&self, data: Value, ctx: &EmitContext) -> Result<Value, ErrorKind> {
        (self.0)(data, ctx).await
    }
}
