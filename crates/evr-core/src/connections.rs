// SPDX-License-Identifier: MIT

//! A shared, cheaply-cloned count of in-flight connections.
//!
//! Lives here rather than in `evr-transport` (the crate that actually
//! owns connections) because the shutdown coordinator in `evr-router`
//! needs to read it to fill in `ShutdownSummary::pending_connections`
//! (§4.6), and `evr-router` cannot depend on `evr-transport` — the
//! dependency runs the other way. Both crates already depend on
//! `evr-core`, so the counter lives at the one place both can reach.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A clonable handle onto one shared in-flight-connection count.
///
/// `evr-transport`'s `Listener` owns the counter and increments it for
/// the lifetime of each accepted connection (via [`ConnectionCounter::guard`]);
/// `evr-router`'s shutdown coordinator holds a clone to read
/// [`ConnectionCounter::active`] when it reports the termination summary.
#[derive(Clone, Default)]
pub struct ConnectionCounter {
    count: Arc<AtomicUsize>,
}

impl ConnectionCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current number of connections holding a live guard.
    pub fn active(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    /// Increment for the duration of one connection; decrements again
    /// when the returned guard drops, however the connection ends.
    pub fn guard(&self) -> ConnectionGuard {
        self.count.fetch_add(1, Ordering::SeqCst);
        ConnectionGuard { count: self.count.clone() }
    }
}

/// RAII handle held for the lifetime of one connection.
pub struct ConnectionGuard {
    count: Arc<AtomicUsize>,
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.count.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
#[path = "connections_tests.rs"]
mod tests;
