// SPDX-License-Identifier: MIT

//! The handler registry (C2): `register` / `unregister` / `resolve`.
//!
//! `resolve` is the hot path — every `emit` calls it — so the ordered
//! handler list per event name is memoized behind a generation counter:
//! registration/unregistration bumps the counter, and `resolve` only
//! recomputes and re-sorts a pattern's candidate list when its cached
//! copy is stale.

use crate::discover::ParamSpec;
use crate::handler::Handler;
use evr_core::pattern::Pattern;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

evr_core::define_id! {
    /// Identifies one handler registration.
    pub struct HandlerId("hdl-");
}

/// A predicate over an event's `data`, used to conditionally skip a
/// handler without unregistering it.
pub type Filter = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// One registered handler, as stored by the registry.
pub struct HandlerRecord {
    pub id: HandlerId,
    pub module: String,
    pub function: String,
    pub pattern: Pattern,
    pub priority: u8,
    pub filter: Option<Filter>,
    pub handler: Arc<dyn Handler>,
    pub params: Vec<ParamSpec>,
    /// Registration order; breaks ties at equal priority (I1).
    seq: u64,
}

impl std::fmt::Debug for HandlerRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRecord")
            .field("id", &self.id)
            .field("module", &self.module)
            .field("function", &self.function)
            .field("pattern", &self.pattern.as_str())
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .finish()
    }
}

/// A handler resolved for a concrete event name, ready to invoke.
#[derive(Clone)]
pub struct ResolvedHandler {
    pub id: HandlerId,
    pub module: String,
    pub priority: u8,
    pub filter: Option<Filter>,
    pub handler: Arc<dyn Handler>,
}

struct Inner {
    /// Keyed by (module, function, pattern text) — registration identity
    /// per I3. Re-registering the same identity updates in place.
    by_identity: HashMap<(String, String, String), HandlerId>,
    by_id: HashMap<HandlerId, HandlerRecord>,
    next_seq: u64,
    generation: u64,
    cache: HashMap<String, (u64, Vec<ResolvedHandler>)>,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            by_identity: HashMap::new(),
            by_id: HashMap::new(),
            next_seq: 0,
            generation: 0,
            cache: HashMap::new(),
        }
    }
}

/// The handler registry.
#[derive(Default)]
pub struct Registry {
    inner: RwLock<Inner>,
}

/// Parameters for [`Registry::register`], grouped to keep the call site
/// readable (mirrors the workspace's `*Params` struct convention, e.g.
/// `commands::RunCommandParams`).
pub struct Registration {
    pub module: String,
    pub function: String,
    pub pattern: Pattern,
    pub priority: u8,
    pub filter: Option<Filter>,
    pub handler: Arc<dyn Handler>,
    pub params: Vec<ParamSpec>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler. Idempotent per `(module, function, pattern)`:
    /// a second registration under the same identity updates priority,
    /// filter, handler, and params in place and returns the original id.
    pub fn register(&self, reg: Registration) -> HandlerId {
        let mut inner = self.inner.write();
        let key = (reg.module.clone(), reg.function.clone(), reg.pattern.as_str().to_string());
        if let Some(&existing) = inner.by_identity.get(&key) {
            if let Some(record) = inner.by_id.get_mut(&existing) {
                record.priority = reg.priority;
                record.filter = reg.filter;
                record.handler = reg.handler;
                record.params = reg.params;
            }
            inner.generation += 1;
            return existing;
        }
        let id = HandlerId::new();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.by_identity.insert(key, id);
        inner.by_id.insert(
            id,
            HandlerRecord {
                id,
                module: reg.module,
                function: reg.function,
                pattern: reg.pattern,
                priority: reg.priority,
                filter: reg.filter,
                handler: reg.handler,
                params: reg.params,
                seq,
            },
        );
        inner.generation += 1;
        id
    }

    /// Remove a handler by id. Returns `true` if it was present.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let mut inner = self.inner.write();
        let Some(record) = inner.by_id.remove(&id) else {
            return false;
        };
        let key = (record.module, record.function, record.pattern.as_str().to_string());
        inner.by_identity.remove(&key);
        inner.generation += 1;
        true
    }

    /// Resolve the ordered list of handlers for `event_name`: exact-name
    /// matches and pattern matches, merged and sorted by `(priority asc,
    /// seq asc)` (I1/P1). Memoized until the next mutation.
    pub fn resolve(&self, event_name: &str) -> Vec<ResolvedHandler> {
        {
            let inner = self.inner.read();
            if let Some((gen, cached)) = inner.cache.get(event_name) {
                if *gen == inner.generation {
                    return cached.clone();
                }
            }
        }
        let mut inner = self.inner.write();
        // Re-check under the write lock: another writer may have already
        // populated the entry for this generation.
        if let Some((gen, cached)) = inner.cache.get(event_name) {
            if *gen == inner.generation {
                return cached.clone();
            }
        }
        let mut matches: Vec<&HandlerRecord> = inner
            .by_id
            .values()
            .filter(|r| r.pattern.matches(event_name))
            .collect();
        matches.sort_by_key(|r| (r.priority, r.seq));
        let resolved: Vec<ResolvedHandler> = matches
            .into_iter()
            .map(|r| ResolvedHandler {
                id: r.id,
                module: r.module.clone(),
                priority: r.priority,
                filter: r.filter.clone(),
                handler: Arc::clone(&r.handler),
            })
            .collect();
        let gen = inner.generation;
        inner.cache.insert(event_name.to_string(), (gen, resolved.clone()));
        resolved
    }

    /// Number of currently registered handlers (for `system:health`).
    pub fn len(&self) -> usize {
        self.inner.read().by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of every distinct registered pattern and its declared
    /// params, for `system:discover`.
    pub fn discover(&self) -> Vec<(String, Vec<ParamSpec>)> {
        let inner = self.inner.read();
        let mut out: Vec<(String, Vec<ParamSpec>)> = inner
            .by_id
            .values()
            .map(|r| (r.pattern.as_str().to_string(), r.params.clone()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(&b.0));
        out
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
