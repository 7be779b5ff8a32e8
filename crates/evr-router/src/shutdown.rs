// SPDX-License-Identifier: MIT

//! Two-phase coordinated shutdown (C6, §4.6).
//!
//! `system:shutdown` is not a handler invocation like any other — the
//! router special-cases it: it marks shutdown underway, broadcasts to
//! any handlers registered on `system:shutdown` (so criticals get a
//! chance to `shutdown:ack`), then calls
//! [`ShutdownCoordinator::begin`] to wait out the grace period. The
//! overall result *is* the structured termination summary (S6), not a
//! list of handler return values.

use crate::supervisor::TaskSupervisor;
use evr_core::ConnectionCounter;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Notify;

/// How long cancelled tasks get to notice their token and exit before
/// `begin` force-detaches whatever is still running.
const TASK_CANCEL_GRACE: Duration = Duration::from_secs(2);
const TASK_CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

struct Inner {
    criticals: HashSet<String>,
    acknowledged: HashSet<String>,
}

/// The structured termination summary the shutdown coordinator reports
/// once shutdown completes — acknowledged and outstanding criticals,
/// cancelled tasks, and pending connections at exit (read from the
/// [`ConnectionCounter`] `evr-daemon` attaches via
/// [`ShutdownCoordinator::attach_connections`]; `None` if nothing ever
/// attached one, e.g. in a unit test that constructs a bare
/// coordinator).
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownSummary {
    pub status: &'static str,
    pub acked: Vec<String>,
    pub outstanding: Vec<String>,
    pub cancelled_tasks: Vec<String>,
    pub force_detached_tasks: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_connections: Option<usize>,
    /// Not serialized onto the wire; drives the process exit status
    /// (0 normal, 1 deadline exceeded with outstanding acks).
    #[serde(skip)]
    pub exit_code: i32,
}

/// Coordinates the two-phase shutdown protocol: critical handlers
/// register ahead of time, acknowledge via `shutdown:ack`, and
/// [`begin`](ShutdownCoordinator::begin) waits for all of them (or a
/// deadline) before cancelling remaining background tasks.
pub struct ShutdownCoordinator {
    inner: Mutex<Inner>,
    shutting_down: AtomicBool,
    notify: Notify,
    supervisor: Arc<TaskSupervisor>,
    connections: Mutex<Option<ConnectionCounter>>,
    completed: AtomicBool,
    completion_exit_code: AtomicI32,
}

impl ShutdownCoordinator {
    pub fn new(supervisor: Arc<TaskSupervisor>) -> Self {
        Self {
            inner: Mutex::new(Inner { criticals: HashSet::new(), acknowledged: HashSet::new() }),
            shutting_down: AtomicBool::new(false),
            notify: Notify::new(),
            supervisor,
            connections: Mutex::new(None),
            completed: AtomicBool::new(false),
            completion_exit_code: AtomicI32::new(0),
        }
    }

    /// Attach the transport's connection counter so [`begin`](Self::begin)
    /// can report `pending_connections` in the termination summary.
    /// `evr-daemon` calls this once, right after binding the listener —
    /// the coordinator is constructed before the transport exists, so
    /// this can't happen in [`new`](Self::new).
    pub fn attach_connections(&self, counter: ConnectionCounter) {
        *self.connections.lock() = Some(counter);
    }

    /// Whether [`begin`](Self::begin) has finished running (the process
    /// bootstrap polls this to know when to stop accepting connections —
    /// `begin` itself only runs inside whichever `emit("system:shutdown",
    /// ..)` call triggered it, which may be a client request rather than
    /// the process's own signal handler).
    pub fn is_complete(&self) -> bool {
        self.completed.load(Ordering::SeqCst)
    }

    /// The process exit code [`begin`](Self::begin) computed, once
    /// [`is_complete`](Self::is_complete) is `true`.
    pub fn completion_exit_code(&self) -> Option<i32> {
        self.is_complete().then(|| self.completion_exit_code.load(Ordering::SeqCst))
    }

    /// Register `name` as a critical handler that must `shutdown:ack`
    /// before shutdown can complete normally.
    pub fn register_critical(&self, name: impl Into<String>) {
        self.inner.lock().criticals.insert(name.into());
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down.load(Ordering::SeqCst)
    }

    /// Record a `shutdown:ack` from `name`.
    pub fn acknowledge(&self, name: &str) {
        self.inner.lock().acknowledged.insert(name.to_string());
        self.notify.notify_waiters();
    }

    /// Flip to shutting-down (I5): new non-allow-listed emissions are
    /// refused from this point on. Split out from [`begin`](Self::begin)
    /// so the router can broadcast `system:shutdown` to registered
    /// handlers *before* the ack-wait loop starts — a critical handler
    /// only gets a chance to call `shutdown:ack` if it is actually
    /// invoked for the broadcast.
    pub fn mark_shutting_down(&self) {
        self.shutting_down.store(true, Ordering::SeqCst);
    }

    /// Wait up to `grace` for every registered critical to acknowledge,
    /// then cancel remaining background tasks (§4.6 step 4) and report
    /// the structured termination summary. Call [`mark_shutting_down`]
    /// (and broadcast `system:shutdown` to handlers) before this.
    pub async fn begin(&self, grace: Duration) -> ShutdownSummary {
        self.mark_shutting_down();
        let criticals = self.inner.lock().criticals.clone();

        let deadline = Instant::now() + grace;
        loop {
            let outstanding_empty = {
                let inner = self.inner.lock();
                criticals.iter().all(|c| inner.acknowledged.contains(c))
            };
            if outstanding_empty {
                break;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            let _ = tokio::time::timeout(remaining, self.notify.notified()).await;
        }

        let cancelled_tasks = self.supervisor.cancel_all();
        // Give cooperatively-cancelled tasks a short window to notice their
        // token and exit on their own (C5: "expected to honor cancellation
        // promptly") before anything still running gets force-detached.
        let task_deadline = Instant::now() + TASK_CANCEL_GRACE;
        while self.supervisor.task_count() > 0 && Instant::now() < task_deadline {
            tokio::time::sleep(TASK_CANCEL_POLL_INTERVAL).await;
        }
        let force_detached_tasks: Vec<String> =
            self.supervisor.list_tasks().into_iter().map(|t| t.name).collect();
        for name in &force_detached_tasks {
            self.supervisor.abort_task(name);
        }

        let inner = self.inner.lock();
        let mut acked: Vec<String> = inner.acknowledged.iter().cloned().collect();
        acked.sort();
        let mut outstanding: Vec<String> =
            criticals.iter().filter(|c| !inner.acknowledged.contains(*c)).cloned().collect();
        outstanding.sort();
        let exit_code = if outstanding.is_empty() { 0 } else { 1 };
        self.completion_exit_code.store(exit_code, Ordering::SeqCst);
        self.completed.store(true, Ordering::SeqCst);
        let pending_connections = self.connections.lock().as_ref().map(ConnectionCounter::active);

        ShutdownSummary {
            status: "shutdown_complete",
            acked,
            outstanding,
            cancelled_tasks,
            force_detached_tasks,
            pending_connections,
            exit_code,
        }
    }
}

#[cfg(test)]
#[path = "shutdown_tests.rs"]
mod tests;
