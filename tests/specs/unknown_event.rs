//! S2 — an event with no matching handler or transformer yields an
//! empty result list rather than a `not_found` error (Open Question
//! resolution recorded in DESIGN.md).

use crate::prelude::Daemon;
use serde_json::json;

#[test]
fn unknown_event_returns_empty_results() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    let response = client.emit("does:not:exist", json!({}));

    assert_eq!(response, json!({"results": []}));
}

#[test]
fn missing_event_field_is_rejected() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    let response = client.send(&json!({"data": {}}));

    assert_eq!(response["error"], "missing_event");
}

#[test]
fn correlation_id_is_echoed_back() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    let response = client.emit_with_correlation("does:not:exist", json!({}), "corr-123");

    assert_eq!(response, json!({"results": [], "correlation_id": "corr-123"}));
}
