//! S6 — coordinated shutdown initiated by a client request.
//!
//! There is no wire-level way to register a critical handler (that's
//! an in-process `Router::register_critical_shutdown` call), so the
//! ack-wait/outstanding-ack path is covered by `evr-router`'s own
//! `shutdown_tests.rs`; this spec exercises what a client actually
//! observes: the response shape and the process actually exiting.

use crate::prelude::Daemon;
use serde_json::json;

#[test]
fn system_shutdown_reports_summary_and_process_exits_cleanly() {
    let mut daemon = Daemon::start();
    let mut client = daemon.connect();

    let response = client.emit("system:shutdown", json!({}));

    assert_eq!(response["status"], "shutdown_complete");
    assert_eq!(response["acked"], json!([]));
    assert_eq!(response["outstanding"], json!([]));

    let code = daemon.wait_for_exit(2_000);
    assert_eq!(code, Some(0), "evrd should exit 0 after a clean shutdown with no outstanding acks");
}

#[test]
fn post_shutdown_emissions_are_refused() {
    let daemon = Daemon::start();
    let mut client = daemon.connect();

    // `system:shutdown`'s response is only written once `begin` has
    // already run to completion (router.rs), so by the time this
    // returns, the router is already shutting down — a second frame on
    // the same still-open connection is the reliable way to observe
    // that, without racing the process's own exit.
    client.emit("system:shutdown", json!({}));

    let response = client.emit("system:health", json!({}));
    assert_eq!(response["error"], "shutting_down");
}
