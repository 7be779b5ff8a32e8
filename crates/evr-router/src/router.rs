// SPDX-License-Identifier: MIT

//! The central `emit` dispatch router (C4, §4.4).
//!
//! `Router::emit` is the sole entry point top-level callers (the
//! transport, background tasks) use; it acquires the dispatch lock once
//! and drives the whole dispatch — including every nested transformer
//! re-emission — inside that single critical section. Handlers that call
//! back into the router recursively use [`Router::emit_nested`], which
//! shares the already-held lock instead of trying to reacquire it.
//!
//! `system:shutdown` is the one exception: it only holds the dispatch
//! lock for the handler broadcast, then releases it before waiting out
//! the shutdown grace period (§4.6), so a critical handler's
//! `shutdown:ack` — arriving as its own top-level `emit` — is never
//! locked out while that wait is in progress. See
//! [`Router::dispatch_system_shutdown`].

use crate::error::{wire_error, wire_info};
use crate::handler::Handler;
use crate::middleware::{Middleware, MiddlewareOutcome};
use crate::registry::{HandlerId, Registration, Registry};
use crate::shutdown::ShutdownCoordinator;
use crate::supervisor::TaskSupervisor;
use crate::transformer::{Evaluated, TransformerEngine, TransformerId, TransformerRule};
use crate::RouterError;
use evr_core::{Clock, EmitContext, ErrorKind, SystemClock};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Process-wide policy for how a handler error is surfaced (`KSI_ERROR_MODE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorMode {
    /// A handler error becomes a `{error: ...}` result entry; dispatch
    /// continues with the remaining handlers and transformers (default).
    Catch,
    /// A handler error aborts the rest of dispatch; the emission's
    /// result list becomes that single error entry.
    Propagate,
}

impl Default for ErrorMode {
    fn default() -> Self {
        ErrorMode::Catch
    }
}

/// Construction-time configuration for a [`Router`].
pub struct RouterConfig<C: Clock = SystemClock> {
    pub clock: C,
    pub error_mode: ErrorMode,
    pub depth_max: u32,
    pub shutdown_grace: Duration,
    pub correlation_ttl: Duration,
}

impl Default for RouterConfig<SystemClock> {
    fn default() -> Self {
        Self {
            clock: SystemClock,
            error_mode: ErrorMode::Catch,
            depth_max: crate::DEFAULT_EMIT_DEPTH_MAX,
            shutdown_grace: Duration::from_secs(30),
            correlation_ttl: Duration::from_secs(crate::DEFAULT_CORRELATION_TTL_SECS),
        }
    }
}

fn is_shutdown_allowlisted(name: &str) -> bool {
    matches!(name, "system:shutdown" | "shutdown:ack")
}

/// The event routing and transformation kernel (C4), generic over its
/// clock so `system:health` uptime and the transformer engine's
/// correlation TTL can be driven by [`evr_core::FakeClock`] in tests.
pub struct Router<C: Clock = SystemClock> {
    registry: Registry,
    transformers: TransformerEngine<C>,
    middleware: RwLock<Vec<Arc<dyn Middleware>>>,
    supervisor: Arc<TaskSupervisor>,
    shutdown: Arc<ShutdownCoordinator>,
    dispatch_lock: tokio::sync::Mutex<()>,
    error_mode: RwLock<ErrorMode>,
    depth_max: u32,
    shutdown_grace: Duration,
    clock: C,
    start_time: Instant,
    next_seq: AtomicU64,
    self_ref: RwLock<Weak<Router<C>>>,
}

impl<C: Clock + 'static> Router<C> {
    /// Build a router. Always returned as an `Arc` — async transformers
    /// need to launch independent, unawaited top-level emissions, which
    /// requires the router to hold a handle to itself.
    pub fn new(config: RouterConfig<C>) -> Arc<Self> {
        let supervisor = Arc::new(TaskSupervisor::new());
        let shutdown = Arc::new(ShutdownCoordinator::new(supervisor.clone()));
        let router = Arc::new(Self {
            registry: Registry::new(),
            transformers: TransformerEngine::new(config.clock.clone(), config.correlation_ttl),
            middleware: RwLock::new(Vec::new()),
            supervisor,
            shutdown,
            dispatch_lock: tokio::sync::Mutex::new(()),
            error_mode: RwLock::new(config.error_mode),
            depth_max: config.depth_max,
            shutdown_grace: config.shutdown_grace,
            start_time: config.clock.now(),
            clock: config.clock,
            next_seq: AtomicU64::new(0),
            self_ref: RwLock::new(Weak::new()),
        });
        *router.self_ref.write() = Arc::downgrade(&router);
        router
    }

    fn next_seq(&self) -> u64 {
        self.next_seq.fetch_add(1, Ordering::Relaxed)
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn transformers(&self) -> &TransformerEngine<C> {
        &self.transformers
    }

    pub fn supervisor(&self) -> &Arc<TaskSupervisor> {
        &self.supervisor
    }

    pub fn shutdown_coordinator(&self) -> &Arc<ShutdownCoordinator> {
        &self.shutdown
    }

    pub fn uptime(&self) -> Duration {
        self.clock.now().saturating_duration_since(self.start_time)
    }

    pub fn error_mode(&self) -> ErrorMode {
        *self.error_mode.read()
    }

    pub fn set_error_mode(&self, mode: ErrorMode) {
        *self.error_mode.write() = mode;
    }

    pub fn use_middleware(&self, middleware: Arc<dyn Middleware>) {
        self.middleware.write().push(middleware);
    }

    pub fn register_handler(&self, registration: Registration) -> HandlerId {
        self.registry.register(registration)
    }

    pub fn unregister_handler(&self, id: HandlerId) -> bool {
        self.registry.unregister(id)
    }

    pub fn register_transformer(
        &self,
        rule: TransformerRule,
        owner: impl Into<String>,
    ) -> Result<TransformerId, RouterError> {
        self.transformers.register(rule, owner)
    }

    pub fn unregister_transformer(&self, id: TransformerId, owner: &str) -> bool {
        self.transformers.unregister(id, owner)
    }

    pub fn list_transformers(&self) -> Vec<Value> {
        self.transformers.list()
    }

    pub fn start_task<F, Fut>(
        &self,
        name: impl Into<String>,
        owner: Option<String>,
        replace: bool,
        f: F,
    ) -> Result<(), ErrorKind>
    where
        F: FnOnce(CancellationToken) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        self.supervisor.start_task(name, owner, replace, f)
    }

    pub fn cancel_task(&self, name: &str) -> bool {
        self.supervisor.cancel_task(name)
    }

    pub fn register_critical_shutdown(&self, name: impl Into<String>) {
        self.shutdown.register_critical(name);
    }

    /// Top-level emission: acquires the dispatch lock for the duration of
    /// this call and every nested re-emission it triggers, then runs the
    /// dispatch algorithm (§4.4 steps 1-8).
    ///
    /// `system:shutdown` is the one exception — it manages the lock
    /// itself in [`Router::dispatch_system_shutdown`] rather than
    /// holding it across the whole call, so that a critical handler's
    /// own separate top-level `emit("shutdown:ack", ...)` can still get
    /// the lock while shutdown's grace-period wait is in progress.
    pub async fn emit(&self, name: impl Into<String>, data: Value, ctx: Option<EmitContext>) -> Vec<Value> {
        let name = name.into();
        let ctx = ctx.unwrap_or_else(|| EmitContext::root(None, self.next_seq()));

        // Fast-refuse without ever touching the dispatch lock (I5, §4.6
        // step 1): the shutdown flag is a plain atomic, so a flood of
        // unrelated top-level emissions arriving after shutdown starts
        // never queues behind whatever currently holds the lock.
        if self.shutdown.is_shutting_down() && !is_shutdown_allowlisted(&name) {
            return vec![wire_error(&ErrorKind::ShuttingDown)];
        }

        if name == "system:shutdown" {
            return self.dispatch_system_shutdown(data, ctx).await;
        }

        let _guard = self.dispatch_lock.lock().await;
        self.dispatch(name, data, ctx, false).await
    }

    /// Handle a top-level `system:shutdown` emission (§4.6 steps 1-2).
    ///
    /// Holds `dispatch_lock` only for the broadcast phase — marking
    /// shutting-down and invoking every handler registered on
    /// `system:shutdown` — so I1 ordering still holds for the broadcast
    /// itself. The lock is released *before*
    /// [`ShutdownCoordinator::begin`]'s ack-wait loop, which can run for
    /// up to `shutdown_grace` (default 30s): holding the lock across
    /// that wait would block a critical handler's own separate top-level
    /// `emit("shutdown:ack", ...)` from ever reaching
    /// [`ShutdownCoordinator::acknowledge`] — exactly the ack `begin` is
    /// waiting on — guaranteeing the grace period always expires instead
    /// of completing early on ack.
    async fn dispatch_system_shutdown(&self, data: Value, ctx: EmitContext) -> Vec<Value> {
        {
            let _guard = self.dispatch_lock.lock().await;
            self.shutdown.mark_shutting_down();
            let stamped = ctx.stamp(data);
            let mode = self.error_mode();
            for resolved in self.registry.resolve("system:shutdown") {
                if let Some(filter) = &resolved.filter {
                    if !filter(&stamped) {
                        continue;
                    }
                }
                match resolved.handler.call(stamped.clone(), &ctx).await {
                    Ok(_) => {}
                    Err(err) => {
                        tracing::warn!(handler = %resolved.id, error = %err, "system:shutdown handler error");
                        if mode == ErrorMode::Propagate {
                            break;
                        }
                    }
                }
            }
        }

        let summary = self.shutdown.begin(self.shutdown_grace).await;
        tracing::info!(acked = ?summary.acked, outstanding = ?summary.outstanding, "shutdown complete");
        vec![serde_json::to_value(&summary).unwrap_or(Value::Null)]
    }

    /// Like [`Router::emit`], but returns the first non-null result —
    /// an optimization for lookup-style emissions with one expected
    /// responder.
    pub async fn emit_first(&self, name: impl Into<String>, data: Value, ctx: Option<EmitContext>) -> Option<Value> {
        self.emit(name, data, ctx).await.into_iter().find(|v| !v.is_null())
    }

    /// Re-emit from inside a running handler, one level deeper, without
    /// acquiring the dispatch lock again — the caller is already running
    /// inside the serialized section its own top-level `emit` opened.
    pub async fn emit_nested(&self, name: impl Into<String>, data: Value, ctx: &EmitContext) -> Vec<Value> {
        self.dispatch(name.into(), data, ctx.nested(), false).await
    }

    fn dispatch(&self, name: String, data: Value, ctx: EmitContext, via_transformer: bool) -> BoxFuture<'_, Vec<Value>> {
        async move {
            if self.shutdown.is_shutting_down() && !is_shutdown_allowlisted(&name) {
                return vec![wire_error(&ErrorKind::ShuttingDown)];
            }

            // `system:shutdown` itself is only ever handled at the top
            // level, by `Router::dispatch_system_shutdown` — never from
            // here, so that its lock-then-release-then-wait structure
            // isn't bypassed by a nested or transformer-triggered
            // re-entry holding this call's already-acquired guard across
            // the whole recursive `dispatch` tree.

            if name == "shutdown:ack" {
                return match data.get("name").and_then(Value::as_str) {
                    Some(ack_name) => {
                        self.shutdown.acknowledge(ack_name);
                        vec![serde_json::json!({"status": "ack_recorded", "name": ack_name})]
                    }
                    None => vec![wire_error(&ErrorKind::ParseError("shutdown:ack requires data.name".to_string()))],
                };
            }

            // I2/§4.3 scope the depth counter to transformer re-emission
            // specifically: `ctx.depth` only ever advances via
            // `EmitContext::nested_transform` (sync/async transformer
            // firing and response-route completion, all below).
            // Handler-initiated recursion via `emit_nested` uses
            // `EmitContext::nested`, which never advances `depth`, so it
            // never trips this regardless of how many levels a handler
            // recurses (§2: "handlers may call C4.emit recursively") —
            // `via_transformer` itself isn't checked here because an
            // async transformer's detached re-emission re-enters through
            // the public `emit` (always `via_transformer = false`) after
            // its own `nested_transform` bump, and still needs this check
            // to apply.
            if ctx.depth > self.depth_max {
                let message = format!("transformer chain re-entered '{name}' beyond max depth {}", self.depth_max);
                tracing::warn!(event = %name, depth = ctx.depth, via_transformer, "cyclic transform depth exceeded");
                return vec![wire_error(&ErrorKind::CyclicTransform(message))];
            }

            let data = ctx.stamp(data);

            let hooks: Vec<Arc<dyn Middleware>> = self.middleware.read().clone();
            for hook in &hooks {
                match hook.call(&name, &data, &ctx).await {
                    MiddlewareOutcome::Continue => {}
                    MiddlewareOutcome::Terminal(results) => return results,
                }
            }

            let handlers = self.registry.resolve(&name);
            let mode = self.error_mode();
            let mut results = Vec::with_capacity(handlers.len());
            for resolved in &handlers {
                if let Some(filter) = &resolved.filter {
                    if !filter(&data) {
                        tracing::debug!(event = %name, handler = %resolved.id, "filter rejected");
                        results.push(wire_info(&ErrorKind::FilterRejected(resolved.id.to_string())));
                        continue;
                    }
                }
                match resolved.handler.call(data.clone(), &ctx).await {
                    Ok(value) => results.push(value),
                    Err(err) => {
                        tracing::warn!(event = %name, handler = %resolved.id, error = %err, "handler error");
                        match mode {
                            ErrorMode::Catch => results.push(wire_error(&err)),
                            // §7: propagate mode aborts the emission and
                            // escapes to the transport as `internal_error`,
                            // not the originating handler error's own wire
                            // code.
                            ErrorMode::Propagate => {
                                return vec![wire_error(&ErrorKind::Internal(err.to_string()))]
                            }
                        }
                    }
                }
            }

            for (id, evaluated) in self.transformers.evaluate_sync(&name, &data) {
                match evaluated {
                    Evaluated::Skipped => {}
                    Evaluated::Error(err) => {
                        tracing::warn!(transformer = %id, error = %err, "transformer evaluation failed");
                        results.push(wire_error(&err));
                    }
                    Evaluated::Fire { target, data: mapped } => {
                        let fired = self.dispatch(target, mapped, ctx.nested_transform(), true).await;
                        results.extend(fired);
                    }
                }
            }

            for (id, evaluated, transform_id) in self.transformers.evaluate_async(&name, &data, &ctx) {
                match evaluated {
                    Evaluated::Skipped => {}
                    Evaluated::Error(err) => {
                        tracing::warn!(transformer = %id, error = %err, "async transformer evaluation failed");
                        results.push(wire_error(&err));
                    }
                    Evaluated::Fire { target, data: mapped } => {
                        let transform_id = match transform_id {
                            Some(id) => id,
                            None => continue,
                        };
                        results.push(
                            serde_json::json!({"status": "queued", "transform_id": transform_id.to_string()}),
                        );
                        if let Some(router) = self.self_ref.read().upgrade() {
                            let nested_ctx = ctx.nested_transform();
                            tokio::spawn(async move {
                                router.emit(target, mapped, Some(nested_ctx)).await;
                            });
                        }
                    }
                }
            }

            if let Some((to, restored_ctx, inner_data)) = self.transformers.try_complete(&name, &data) {
                let _ = self.dispatch(to, inner_data, restored_ctx.nested_transform(), true).await;
            }

            results
        }
        .boxed()
    }
}

/// Offload unavoidable synchronous CPU work to a worker thread so it does
/// not block other handlers and connections sharing the scheduler (§5).
/// Does not participate in dispatch ordering.
pub async fn run_blocking<F, R>(f: F) -> Result<R, ErrorKind>
where
    F: FnOnce() -> R + Send + 'static,
    R: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ErrorKind::Internal(format!("blocking task panicked: {e}")))
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
