// SPDX-License-Identifier: MIT

use super::*;
use serde_json::json;

#[test]
fn envelope_defaults_data_to_null_when_absent() {
    let env: Envelope = serde_json::from_str(r#"{"event": "agent:started"}"#).unwrap();
    assert_eq!(env.event, "agent:started");
    assert!(env.data.is_null());
    assert!(env.correlation_id.is_none());
}

#[test]
fn envelope_round_trips_optional_identity_fields() {
    let env = Envelope {
        event: "agent:started".into(),
        data: json!({"x": 1}),
        correlation_id: Some("cor-abc".into()),
        originator_id: Some("agent-1".into()),
        construct_id: None,
    };
    let wire = serde_json::to_value(&env).unwrap();
    assert_eq!(wire["correlation_id"], "cor-abc");
    assert!(wire.get("construct_id").is_none());
}

#[test]
fn root_context_starts_at_depth_zero() {
    let ctx = EmitContext::root(None, 1);
    assert_eq!(ctx.depth, 0);
}

#[test]
fn nested_context_does_not_advance_depth_but_shares_correlation() {
    // §4.3 scopes the depth counter to transformer re-emission only;
    // handler-initiated recursion uses `nested`, not `nested_transform`.
    let root = EmitContext::root(Some(ClientId::new()), 1);
    let child = root.nested();
    assert_eq!(child.depth, 0);
    assert_eq!(child.correlation_id, root.correlation_id);
    assert_eq!(child.client_id, root.client_id);
}

#[test]
fn nested_transform_context_increments_depth() {
    let root = EmitContext::root(Some(ClientId::new()), 1);
    let first_hop = root.nested_transform();
    assert_eq!(first_hop.depth, 1);
    let second_hop = first_hop.nested_transform();
    assert_eq!(second_hop.depth, 2);
    assert_eq!(second_hop.correlation_id, root.correlation_id);
}

#[test]
fn nested_cancellation_propagates_from_parent() {
    let root = EmitContext::root(None, 1);
    let child = root.nested();
    root.cancel.cancel();
    assert!(child.cancel.is_cancelled());
}

#[test]
fn stamp_merges_meta_into_object_data() {
    let ctx = EmitContext::root(None, 5);
    let stamped = ctx.stamp(json!({"foo": "bar"}));
    assert_eq!(stamped["foo"], "bar");
    assert_eq!(stamped["_meta"]["seq"], 5);
    assert_eq!(stamped["_meta"]["depth"], 0);
}

#[test]
fn stamp_coerces_non_object_data_to_object() {
    let ctx = EmitContext::root(None, 0);
    let stamped = ctx.stamp(json!("not an object"));
    assert!(stamped.is_object());
    assert!(stamped.get("_meta").is_some());
}

#[test]
fn from_request_honors_client_supplied_correlation_id() {
    let ctx = EmitContext::from_request(None, 1, Some("cor-client-supplied000"), None, None);
    assert_eq!(ctx.correlation_id.to_string(), "cor-client-supplied000");
}

#[test]
fn from_request_mints_correlation_id_when_absent() {
    let ctx = EmitContext::from_request(None, 1, None, None, None);
    assert!(!ctx.correlation_id.is_empty());
}

#[test]
fn to_meta_reports_cancellable_true() {
    let ctx = EmitContext::root(None, 0);
    assert!(ctx.to_meta().cancellable);
}
