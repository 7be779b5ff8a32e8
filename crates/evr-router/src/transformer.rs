// SPDX-License-Identifier: MIT

//! The transformer engine (C3): declarative YAML rules that map a
//! matching source event onto a target event, synchronously or with
//! async response routing (§4.3).

use crate::condition;
use crate::error::RouterError;
use crate::mapping;
use evr_core::pattern::Pattern;
use evr_core::{Clock, EmitContext, ErrorKind, SystemClock};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::{Duration, Instant};

evr_core::define_id! {
    /// Identifies one registered transformer rule.
    pub struct TransformerId("xfm-");
}

evr_core::define_id! {
    /// The `τ` correlation id an async transformer stamps onto its
    /// target event's data as `_transform_id`.
    pub struct TransformId("xid-");
}

/// `response_route` for an async transformer: the event pattern that
/// carries the completion, and the event name the engine re-emits as
/// once it sees a matching `_transform_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseRoute {
    pub from: String,
    pub to: String,
}

/// One transformer rule, in the YAML shape `router:register_transformer`
/// consumes (§6).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformerRule {
    pub source: String,
    pub target: String,
    #[serde(default = "default_mapping")]
    pub mapping: Value,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default, rename = "async")]
    pub is_async: bool,
    #[serde(default)]
    pub response_route: Option<ResponseRoute>,
}

fn default_mapping() -> Value {
    Value::Object(Default::default())
}

/// The top-level YAML document shape: `{transformers: [...]}`.
#[derive(Debug, Deserialize)]
struct TransformerFile {
    transformers: Vec<TransformerRule>,
}

/// Parse a transformer YAML document into its rules, without
/// registering them.
pub fn parse_yaml(yaml: &str) -> Result<Vec<TransformerRule>, RouterError> {
    let file: TransformerFile = serde_yaml::from_str(yaml)?;
    Ok(file.transformers)
}

/// Parse a `router:register_transformer` payload, which may be either a
/// single transformer-rule object or a `{transformers: [...]}` document —
/// the same two shapes a YAML config file may take, just over JSON (§4.3).
pub fn parse_registration(data: &Value) -> Result<Vec<TransformerRule>, serde_json::Error> {
    if data.get("transformers").is_some() {
        let file: TransformerFile = serde_json::from_value(data.clone())?;
        Ok(file.transformers)
    } else {
        let rule: TransformerRule = serde_json::from_value(data.clone())?;
        Ok(vec![rule])
    }
}

struct TransformerRecord {
    id: TransformerId,
    rule: TransformerRule,
    source_pattern: Pattern,
    response_from_pattern: Option<Pattern>,
    owners: Vec<String>,
    seq: u64,
}

struct Pending {
    response_route_to: String,
    response_from_pattern: Pattern,
    originating_ctx: EmitContext,
    created_at: Instant,
}

struct Inner {
    records: Vec<TransformerRecord>,
    pending: std::collections::HashMap<TransformId, Pending>,
    next_seq: u64,
}

/// Outcome of evaluating one transformer against an event.
pub enum Evaluated {
    /// The condition evaluated false; this transformer contributes
    /// nothing for this event.
    Skipped,
    /// Mapping/condition evaluation failed (`transform_error`).
    Error(ErrorKind),
    /// The transformer fires: re-emit `target` with `data`.
    Fire { target: String, data: Value },
}

/// The transformer engine, generic over its clock so tests can swap in
/// [`evr_core::FakeClock`] to exercise correlation TTL expiry.
pub struct TransformerEngine<C: Clock = SystemClock> {
    inner: RwLock<Inner>,
    clock: C,
    correlation_ttl: Duration,
}

impl<C: Clock> TransformerEngine<C> {
    pub fn new(clock: C, correlation_ttl: Duration) -> Self {
        Self {
            inner: RwLock::new(Inner {
                records: Vec::new(),
                pending: std::collections::HashMap::new(),
                next_seq: 0,
            }),
            clock,
            correlation_ttl,
        }
    }

    /// Register a transformer rule on behalf of `owner`. Re-registering
    /// an identical rule (same source/target/mapping/condition/async/
    /// response_route) from a different owner bumps that rule's owner
    /// count instead of creating a duplicate — matching shares a single
    /// rule (§3 Lifecycles).
    pub fn register(&self, rule: TransformerRule, owner: impl Into<String>) -> Result<TransformerId, RouterError> {
        let source_pattern = Pattern::compile(&rule.source)?;
        let response_from_pattern = match (&rule.is_async, &rule.response_route) {
            (true, Some(route)) => Some(Pattern::compile(&route.from)?),
            (true, None) => return Err(RouterError::MissingField("response_route")),
            (false, _) => None,
        };

        let mut inner = self.inner.write();
        if let Some(existing) = inner.records.iter_mut().find(|r| r.rule == rule) {
            existing.owners.push(owner.into());
            return Ok(existing.id);
        }
        let id = TransformerId::new();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.records.push(TransformerRecord {
            id,
            rule,
            source_pattern,
            response_from_pattern,
            owners: vec![owner.into()],
            seq,
        });
        Ok(id)
    }

    /// Remove one owner's reference to a transformer; the rule itself is
    /// dropped once its last owner releases it.
    pub fn unregister(&self, id: TransformerId, owner: &str) -> bool {
        let mut inner = self.inner.write();
        let Some(pos) = inner.records.iter().position(|r| r.id == id) else {
            return false;
        };
        if let Some(owner_pos) = inner.records[pos].owners.iter().position(|o| o == owner) {
            inner.records[pos].owners.remove(owner_pos);
        } else {
            inner.records[pos].owners.pop();
        }
        if inner.records[pos].owners.is_empty() {
            inner.records.remove(pos);
        }
        true
    }

    pub fn len(&self) -> usize {
        self.inner.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// List registered transformers for `router:list_transformers`.
    pub fn list(&self) -> Vec<Value> {
        let inner = self.inner.read();
        let mut records: Vec<&TransformerRecord> = inner.records.iter().collect();
        records.sort_by_key(|r| r.seq);
        records
            .into_iter()
            .map(|r| {
                serde_json::json!({
                    "id": r.id.to_string(),
                    "source": r.rule.source,
                    "target": r.rule.target,
                    "async": r.rule.is_async,
                    "owners": r.owners,
                })
            })
            .collect()
    }

    /// Evaluate every sync transformer whose source matches `name`.
    pub fn evaluate_sync(&self, name: &str, data: &Value) -> Vec<(TransformerId, Evaluated)> {
        let inner = self.inner.read();
        inner
            .records
            .iter()
            .filter(|r| !r.rule.is_async && r.source_pattern.matches(name))
            .map(|r| (r.id, evaluate_rule(&r.rule, data)))
            .collect()
    }

    /// Evaluate every async transformer whose source matches `name`,
    /// and register a pending correlation entry for each that fires.
    pub fn evaluate_async(
        &self,
        name: &str,
        data: &Value,
        ctx: &EmitContext,
    ) -> Vec<(TransformerId, Evaluated, Option<TransformId>)> {
        let mut inner = self.inner.write();
        self.sweep_expired_locked(&mut inner);
        let matches: Vec<usize> = inner
            .records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.rule.is_async && r.source_pattern.matches(name))
            .map(|(i, _)| i)
            .collect();

        let mut out = Vec::new();
        for i in matches {
            let evaluated = evaluate_rule(&inner.records[i].rule, data);
            match evaluated {
                Evaluated::Fire { target, data: mapped } => {
                    // `register` rejects async rules without a response_route/
                    // compiled response_from_pattern (see above), so both are
                    // always present by the time a rule reaches this point.
                    #[allow(clippy::expect_used)]
                    let route = inner.records[i].rule.response_route.clone().expect("async requires response_route");
                    #[allow(clippy::expect_used)]
                    let from_pattern = inner.records[i]
                        .response_from_pattern
                        .clone()
                        .expect("async requires compiled response pattern");
                    let tid = TransformId::new();
                    inner.pending.insert(
                        tid,
                        Pending {
                            response_route_to: route.to,
                            response_from_pattern: from_pattern,
                            originating_ctx: ctx.clone(),
                            created_at: self.clock.now(),
                        },
                    );
                    let mut stamped = mapped;
                    if let Value::Object(map) = &mut stamped {
                        map.insert("_transform_id".to_string(), Value::String(tid.to_string()));
                    }
                    out.push((inner.records[i].id, Evaluated::Fire { target, data: stamped }, Some(tid)));
                }
                other => out.push((inner.records[i].id, other, None)),
            }
        }
        out
    }

    /// If `data` carries a `_transform_id` matching a pending
    /// correlation whose `response_route.from` matches `name`, consume
    /// that entry and return the re-emission to perform: the target
    /// event name, the restored originating context, and the data with
    /// `_transform_id` stripped (P4).
    pub fn try_complete(&self, name: &str, data: &Value) -> Option<(String, EmitContext, Value)> {
        let tid = data.get("_transform_id")?.as_str()?;
        let tid = TransformId::from_string(tid);
        let mut inner = self.inner.write();
        self.sweep_expired_locked(&mut inner);
        let pending = inner.pending.get(&tid)?;
        if !pending.response_from_pattern.matches(name) {
            return None;
        }
        let pending = inner.pending.remove(&tid)?;
        let mut stripped = data.clone();
        if let Value::Object(map) = &mut stripped {
            map.remove("_transform_id");
        }
        Some((pending.response_route_to, pending.originating_ctx, stripped))
    }

    fn sweep_expired_locked(&self, inner: &mut Inner) {
        let now = self.clock.now();
        let ttl = self.correlation_ttl;
        inner.pending.retain(|_, p| now.duration_since(p.created_at) < ttl);
    }
}

impl Default for TransformerEngine<SystemClock> {
    fn default() -> Self {
        Self::new(SystemClock, Duration::from_secs(crate::DEFAULT_CORRELATION_TTL_SECS))
    }
}

fn evaluate_rule(rule: &TransformerRule, data: &Value) -> Evaluated {
    if let Some(src) = &rule.condition {
        match condition::parse(src) {
            Ok(expr) => {
                if !condition::eval(&expr, data) {
                    return Evaluated::Skipped;
                }
            }
            Err(e) => return Evaluated::Error(ErrorKind::TransformError(e.to_string())),
        }
    }
    let target = resolve_target(&rule.target, data);
    let mapped = mapping::apply(&rule.mapping, data);
    Evaluated::Fire { target, data: mapped }
}

/// Resolve `{{field}}` templates in a transformer's `target` event name.
/// Event names are always strings, so this always coerces to one
/// regardless of template shape.
fn resolve_target(target: &str, data: &Value) -> String {
    mapping::apply_string_template(target, data)
}

#[cfg(test)]
#[path = "transformer_tests.rs"]
mod tests;
