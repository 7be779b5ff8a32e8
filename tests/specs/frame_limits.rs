//! `KSI_MAX_FRAME_BYTES` (§6) enforced end to end: an oversized frame
//! gets `{"error": "frame_too_large"}` and the connection is closed.

use crate::prelude::Daemon;
use serde_json::json;
use std::io::{BufRead, BufReader, Write};

#[test]
fn oversized_frame_is_rejected_and_connection_closed() {
    let daemon = Daemon::start_with_env(&[("KSI_MAX_FRAME_BYTES", "64")]);
    let mut client = daemon.connect();

    // Well under the limit: behaves normally.
    let ok = client.emit("system:health", json!({}));
    assert_eq!(ok["status"], "ok");

    let oversized = json!({"event": "system:health", "data": {"padding": "x".repeat(200)}});
    let response = client.send(&oversized);
    assert_eq!(response["error"], "frame_too_large");

    // Connection is closed after the oversized frame (§4.7): the next
    // read hits EOF.
    let mut raw = daemon.connect_raw();
    raw.write_all(b"{\"event\":\"system:health\",\"data\":{}}\n").unwrap();
    raw.flush().unwrap();
    let mut reply = String::new();
    BufReader::new(raw).read_line(&mut reply).unwrap();
    assert!(!reply.is_empty(), "a fresh connection should still work after another one was closed");
}
