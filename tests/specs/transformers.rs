//! Transformer registration and firing, end to end over the socket.
//!
//! There is no wire-level handler registration (only
//! `router:register_transformer`/`unregister_transformer`/
//! `list_transformers`), so these specs chain transformers onto the
//! built-in `system:*` handlers to make a fired transformer observable
//! from a client's point of view. Mapping/condition correctness and
//! the async correlation round-trip (R2/R3) are covered at the
//! component level in `evr-router`'s own test suite, where a custom
//! `Handler` can be registered directly.

use crate::prelude::Daemon;
use serde_json::json;

#[test]
fn sync_transformer_chains_into_a_real_handler() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    let registered = client.emit(
        "router:register_transformer",
        json!({"source": "order:placed", "target": "system:health", "mapping": {}}),
    );
    assert_eq!(registered["status"], "registered");

    // order:placed has no handler of its own; the only result in the
    // list comes from the transformer's recursive dispatch into
    // system:health, so it surfaces unwrapped (§4.7 step 4).
    let response = client.emit("order:placed", json!({"user": "u1", "sku": "x"}));
    assert_eq!(response["status"], "ok");
    assert!(response["handler_count"].is_u64());
}

#[test]
fn glob_source_transformer_matches_a_concrete_event_name() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.emit("router:register_transformer", json!({"source": "agent:*", "target": "system:discover"}));

    let response = client.emit("agent:spawn", json!({"id": "a1"}));
    assert!(response["handlers"].is_array());
}

#[test]
fn conditional_transformer_skips_when_condition_is_false() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.emit(
        "router:register_transformer",
        json!({
            "source": "order:scored",
            "target": "system:discover",
            "condition": "priority > 5",
        }),
    );

    let low_priority = client.emit("order:scored", json!({"priority": 1}));
    assert_eq!(low_priority, json!({"results": []}));

    let high_priority = client.emit("order:scored", json!({"priority": 9}));
    assert!(high_priority["handlers"].is_array());
}

#[test]
fn async_transformer_returns_queued_ack() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    client.emit(
        "router:register_transformer",
        json!({
            "source": "compute:request",
            "target": "worker:do",
            "mapping": {"job": "{{job}}"},
            "async": true,
            "response_route": {"from": "worker:done", "to": "compute:request_done"},
        }),
    );

    let response = client.emit_with_correlation("compute:request", json!({"job": "j1"}), "c1");
    assert_eq!(response["status"], "queued");
    assert!(response["transform_id"].as_str().unwrap().starts_with("xid-"));
    assert_eq!(response["correlation_id"], "c1");
}

#[test]
fn register_list_and_unregister_transformer_round_trip() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    let registered =
        client.emit("router:register_transformer", json!({"source": "a:b", "target": "c:d", "owner": "test"}));
    let id = registered["id"].as_str().expect("transformer id").to_string();

    let listed = client.emit("router:list_transformers", json!({}));
    let sources: Vec<&str> =
        listed["transformers"].as_array().unwrap().iter().filter_map(|t| t["source"].as_str()).collect();
    assert!(sources.contains(&"a:b"));

    let unregistered = client.emit("router:unregister_transformer", json!({"id": id, "owner": "test"}));
    assert_eq!(unregistered["status"], "unregistered");

    let listed_after = client.emit("router:list_transformers", json!({}));
    let sources_after: Vec<&str> =
        listed_after["transformers"].as_array().unwrap().iter().filter_map(|t| t["source"].as_str()).collect();
    assert!(!sources_after.contains(&"a:b"));
}
