//! S1 — health check.

use crate::prelude::Daemon;
use serde_json::json;

#[test]
fn system_health_reports_status_and_counts() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    let response = client.emit("system:health", json!({}));

    assert_eq!(response["status"], "ok");
    assert!(response["uptime_seconds"].is_u64());
    assert!(response["handler_count"].as_u64().unwrap() > 0);
    assert!(response["transformer_count"].is_u64());
    assert!(response["task_count"].is_u64());
}

#[test]
fn system_discover_lists_builtin_handlers() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    let response = client.emit("system:discover", json!({}));

    let handlers = response["handlers"].as_array().expect("handlers array");
    let patterns: Vec<&str> = handlers.iter().filter_map(|h| h["pattern"].as_str()).collect();
    assert!(patterns.contains(&"system:health"));
    assert!(patterns.contains(&"router:register_transformer"));
}
