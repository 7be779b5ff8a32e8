// SPDX-License-Identifier: MIT

//! Named background task supervision (C5).
//!
//! Follows the `tokio::spawn` + tracing convention used for background
//! work elsewhere in the workspace (e.g.
//! `daemon::lifecycle::startup::spawn_runtime_event_forwarder`), extended
//! with a name-keyed registry so a caller can look up, cancel, or replace
//! a specific long-running task instead of holding its `JoinHandle`
//! itself.

use evr_core::ErrorKind;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A snapshot of one supervised task, for `list_tasks`.
#[derive(Debug, Clone)]
pub struct TaskInfo {
    pub name: String,
    pub owner: Option<String>,
    pub started_at: Instant,
}

struct TaskRecord {
    owner: Option<String>,
    token: CancellationToken,
    handle: JoinHandle<()>,
    started_at: Instant,
}

struct Inner {
    tasks: HashMap<String, TaskRecord>,
}

/// Tracks named background tasks: `agent:watcher:<id>`-style long-running
/// loops spawned by handlers, kept unique by name unless the caller asks
/// to replace one (I4).
pub struct TaskSupervisor {
    inner: Arc<Mutex<Inner>>,
}

impl TaskSupervisor {
    pub fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(Inner { tasks: HashMap::new() })) }
    }

    /// Start a named task. `f` receives the task's own cancellation token
    /// so it can shut down cooperatively; a panic inside `f` is caught,
    /// logged, and simply removes the task's entry — it never takes the
    /// supervisor or any other task down with it.
    ///
    /// Returns `TaskConflict` if `name` is already running and `replace`
    /// is false; otherwise, if `replace` is true, the existing task is
    /// cancelled (not awaited) before the new one starts.
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
        let name = name.into();
        let mut guard = self.inner.lock();
        if let Some(existing) = guard.tasks.get(&name) {
            if !replace {
                return Err(ErrorKind::TaskConflict(name));
            }
            existing.token.cancel();
            existing.handle.abort();
        }

        let token = CancellationToken::new();
        let body: BoxFuture<'static, ()> = f(token.clone()).boxed();
        let inner = self.inner.clone();
        let task_name = name.clone();
        let handle = tokio::spawn(async move {
            match AssertUnwindSafe(body).catch_unwind().await {
                Ok(()) => tracing::debug!(task = %task_name, "task finished"),
                Err(_) => tracing::error!(task = %task_name, "task panicked"),
            }
            inner.lock().tasks.remove(&task_name);
        });

        guard.tasks.insert(name, TaskRecord { owner, token, handle, started_at: Instant::now() });
        Ok(())
    }

    /// Cooperatively cancel a task by name. Returns `false` if no task by
    /// that name is running.
    pub fn cancel_task(&self, name: &str) -> bool {
        let guard = self.inner.lock();
        match guard.tasks.get(name) {
            Some(record) => {
                record.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Hard-abort a task immediately, for the shutdown coordinator's
    /// force-detach path once its deadline has passed.
    pub fn abort_task(&self, name: &str) -> bool {
        let mut guard = self.inner.lock();
        match guard.tasks.remove(name) {
            Some(record) => {
                record.token.cancel();
                record.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cooperatively cancel every running task, without waiting for any
    /// of them to finish.
    pub fn cancel_all(&self) -> Vec<String> {
        let guard = self.inner.lock();
        let names: Vec<String> = guard.tasks.keys().cloned().collect();
        for record in guard.tasks.values() {
            record.token.cancel();
        }
        names
    }

    pub fn list_tasks(&self) -> Vec<TaskInfo> {
        self.inner
            .lock()
            .tasks
            .iter()
            .map(|(name, record)| TaskInfo {
                name: name.clone(),
                owner: record.owner.clone(),
                started_at: record.started_at,
            })
            .collect()
    }

    pub fn task_count(&self) -> usize {
        self.inner.lock().tasks.len()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.inner.lock().tasks.contains_key(name)
    }
}

impl Default for TaskSupervisor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
