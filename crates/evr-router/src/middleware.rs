// SPDX-License-Identifier: MIT

//! Middleware (§4.4 step 3, Glossary): observes or short-circuits every
//! `emit` call.
//!
//! **Design note (recorded in DESIGN.md):** rather than a continuation-
//! passing chain, `(name, data, ctx, next) -> result`, this implementation
//! models each middleware as a hook returning
//! [`MiddlewareOutcome::Continue`] or [`MiddlewareOutcome::Terminal`];
//! the router runs hooks in registration order and stops at the first
//! terminal outcome. Observably equivalent for short-circuit and
//! inspection behavior, without threading continuation closures through
//! the borrow checker.

use evr_core::EmitContext;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

/// What a middleware hook decided for this emission.
pub enum MiddlewareOutcome {
    /// Let the chain, then handler/transformer dispatch, proceed.
    Continue,
    /// Short-circuit: this result list becomes the emission's result,
    /// and no handler or transformer runs.
    Terminal(Vec<Value>),
}

#[async_trait::async_trait]
pub trait Middleware: Send + Sync {
    async fn call(&self, name: &str, data: &Value, ctx: &EmitContext) -> MiddlewareOutcome;
}

/// Adapt a plain async closure into a [`Middleware`], mirroring
/// [`crate::handler::HandlerFn`].
pub struct MiddlewareFn<F>(pub F);

impl<F, Fut> MiddlewareFn<F>
where
    F: Fn(&str, &Value, &EmitContext) -> Fut + Send + Sync,
    Fut: Future<Output = MiddlewareOutcome> + Send,
{
    pub fn new(f: F) -> Arc<Self> {
        Arc::new(Self(f))
    }
}

#[async_trait::async_trait]
impl<F, Fut> Middleware for MiddlewareFn<F>
where
    F: Fn(&str, &Value, &EmitContext) -> Fut + Send + Sync,
    Fut: Future<Output = MiddlewareOutcome> + Send,
{
    async fn call(&self, name: &str, data: &Value, ctx: &EmitContext) -> MiddlewareOutcome {
        (self.0)(name, data, ctx).await
    }
}

#[cfg(test)]
#[path = "middleware_tests.rs"]
mod tests;
