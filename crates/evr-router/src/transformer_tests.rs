// SPDX-License-Identifier: MIT

use super::*;
use evr_core::FakeClock;
use serde_json::json;

fn engine() -> TransformerEngine<FakeClock> {
    TransformerEngine::new(FakeClock::new(), Duration::from_secs(600))
}

fn rule(source: &str, target: &str, mapping: Value) -> TransformerRule {
    TransformerRule {
        source: source.to_string(),
        target: target.to_string(),
        mapping,
        condition: None,
        is_async: false,
        response_route: None,
    }
}

#[test]
fn sync_transformer_fires_and_maps() {
    let engine = engine();
    engine.register(rule("agent:spawn", "audit:log", json!({"who": "{{agent_id}}"})), "test").unwrap();

    let data = json!({"agent_id": "a1"});
    let results = engine.evaluate_sync("agent:spawn", &data);
    assert_eq!(results.len(), 1);
    match &results[0].1 {
        Evaluated::Fire { target, data } => {
            assert_eq!(target, "audit:log");
            assert_eq!(data, &json!({"who": "a1"}));
        }
        _ => panic!("expected Fire"),
    }
}

#[test]
fn non_matching_source_yields_no_evaluation() {
    let engine = engine();
    engine.register(rule("agent:spawn", "audit:log", json!({})), "test").unwrap();
    assert!(engine.evaluate_sync("agent:stop", &json!({})).is_empty());
}

#[test]
fn condition_false_skips() {
    let engine = engine();
    let mut r = rule("agent:spawn", "audit:log", json!({}));
    r.condition = Some("status == \"ready\"".to_string());
    engine.register(r, "test").unwrap();

    let results = engine.evaluate_sync("agent:spawn", &json!({"status": "pending"}));
    assert_eq!(results.len(), 1);
    assert!(matches!(results[0].1, Evaluated::Skipped));
}

#[test]
fn malformed_condition_is_transform_error() {
    let engine = engine();
    let mut r = rule("agent:spawn", "audit:log", json!({}));
    r.condition = Some("status ===".to_string());
    engine.register(r, "test").unwrap();

    let results = engine.evaluate_sync("agent:spawn", &json!({}));
    assert!(matches!(&results[0].1, Evaluated::Error(ErrorKind::TransformError(_))));
}

#[test]
fn target_template_resolves_against_data() {
    let engine = engine();
    engine.register(rule("agent:spawn", "audit:{{kind}}", json!({})), "test").unwrap();
    let results = engine.evaluate_sync("agent:spawn", &json!({"kind": "spawned"}));
    match &results[0].1 {
        Evaluated::Fire { target, .. } => assert_eq!(target, "audit:spawned"),
        _ => panic!("expected Fire"),
    }
}

#[test]
fn reregistering_identical_rule_shares_identity() {
    let engine = engine();
    let id1 = engine.register(rule("agent:spawn", "audit:log", json!({})), "owner_a").unwrap();
    let id2 = engine.register(rule("agent:spawn", "audit:log", json!({})), "owner_b").unwrap();
    assert_eq!(id1, id2);
    assert_eq!(engine.len(), 1);
}

#[test]
fn unregister_last_owner_removes_rule() {
    let engine = engine();
    let id = engine.register(rule("agent:spawn", "audit:log", json!({})), "owner_a").unwrap();
    engine.register(rule("agent:spawn", "audit:log", json!({})), "owner_b").unwrap();
    assert!(engine.unregister(id, "owner_a"));
    assert_eq!(engine.len(), 1);
    assert!(engine.unregister(id, "owner_b"));
    assert_eq!(engine.len(), 0);
}

#[test]
fn async_transformer_requires_response_route() {
    let engine = engine();
    let mut r = rule("compute:request", "worker:run", json!({}));
    r.is_async = true;
    let err = engine.register(r, "test").unwrap_err();
    assert!(matches!(err, RouterError::MissingField("response_route")));
}

#[test]
fn async_transformer_stamps_transform_id_and_completes_via_response_route() {
    let engine = engine();
    let mut r = rule("compute:request", "worker:run", json!({"job": "{{job_id}}"}));
    r.is_async = true;
    r.response_route = Some(ResponseRoute { from: "worker:done".to_string(), to: "compute:request_done".to_string() });
    engine.register(r, "test").unwrap();

    let ctx = EmitContext::root(None, 1);
    let data = json!({"job_id": "j1"});
    let fired = engine.evaluate_async("compute:request", &data, &ctx);
    assert_eq!(fired.len(), 1);
    let (_, evaluated, tid) = &fired[0];
    let tid = tid.expect("async fire stamps a transform id");
    let stamped_data = match evaluated {
        Evaluated::Fire { target, data } => {
            assert_eq!(target, "worker:run");
            assert_eq!(data["job"], json!("j1"));
            assert_eq!(data["_transform_id"], json!(tid.to_string()));
            data.clone()
        }
        _ => panic!("expected Fire"),
    };

    // an unrelated event carrying the same id does not complete the
    // correlation if it doesn't match the registered response_route.from.
    assert!(engine.try_complete("worker:other", &stamped_data).is_none());

    let completion_data = json!({"_transform_id": stamped_data["_transform_id"], "result": 42});
    let (to, restored_ctx, out_data) = engine.try_complete("worker:done", &completion_data).expect("should complete");
    assert_eq!(to, "compute:request_done");
    assert_eq!(restored_ctx.correlation_id, ctx.correlation_id);
    assert_eq!(out_data, json!({"result": 42}));

    // consumed: a second completion attempt finds nothing pending.
    assert!(engine.try_complete("worker:done", &completion_data).is_none());
}

#[test]
fn expired_correlation_is_swept_and_does_not_complete() {
    let clock = FakeClock::new();
    let engine = TransformerEngine::new(clock.clone(), Duration::from_secs(60));
    let mut r = rule("compute:request", "worker:run", json!({}));
    r.is_async = true;
    r.response_route = Some(ResponseRoute { from: "worker:done".to_string(), to: "compute:request_done".to_string() });
    engine.register(r, "test").unwrap();

    let ctx = EmitContext::root(None, 1);
    let fired = engine.evaluate_async("compute:request", &json!({}), &ctx);
    let (_, _, tid) = &fired[0];
    let tid = tid.unwrap();

    clock.advance(Duration::from_secs(61));

    let completion_data = json!({"_transform_id": tid.to_string()});
    assert!(engine.try_complete("worker:done", &completion_data).is_none());
}

#[test]
fn parse_yaml_reads_transformer_list() {
    let yaml = r#"
transformers:
  - source: "agent:spawn"
    target: "audit:log"
    mapping:
      who: "{{agent_id}}"
  - source: "compute:request"
    target: "worker:run"
    async: true
    response_route:
      from: "worker:done"
      to: "compute:request_done"
"#;
    let rules = parse_yaml(yaml).unwrap();
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].source, "agent:spawn");
    assert!(!rules[0].is_async);
    assert!(rules[1].is_async);
    assert_eq!(rules[1].response_route.as_ref().unwrap().to, "compute:request_done");
}

#[test]
fn list_reports_registered_transformers_in_registration_order() {
    let engine = engine();
    engine.register(rule("a:1", "b:1", json!({})), "owner").unwrap();
    engine.register(rule("a:2", "b:2", json!({})), "owner").unwrap();
    let listed = engine.list();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["source"], json!("a:1"));
    assert_eq!(listed[1]["source"], json!("a:2"));
}
