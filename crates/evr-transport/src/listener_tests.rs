// SPDX-License-Identifier: MIT

use super::*;
use crate::frame::DEFAULT_MAX_FRAME_BYTES;
use evr_core::FakeClock;
use evr_router::registry::Registration;
use evr_router::router::{ErrorMode, RouterConfig};
use evr_router::{handler::HandlerFn, Pattern};
use serde_json::json;
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;

fn test_router() -> Arc<Router<FakeClock>> {
    Router::new(RouterConfig {
        clock: FakeClock::new(),
        error_mode: ErrorMode::Catch,
        depth_max: 4,
        shutdown_grace: Duration::from_millis(50),
        correlation_ttl: Duration::from_secs(600),
    })
}

#[tokio::test]
async fn bind_creates_socket_with_owner_only_permissions() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evr.sock");
    let listener = Listener::bind(&TransportConfig::new(&path, DEFAULT_MAX_FRAME_BYTES)).unwrap();

    let meta = std::fs::metadata(&path).unwrap();
    assert_eq!(meta.permissions().mode() & 0o777, 0o600);

    drop(listener);
    assert!(!path.exists());
}

#[tokio::test]
async fn freshly_bound_listener_reports_no_active_connections() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evr.sock");
    let listener = Listener::bind(&TransportConfig::new(&path, DEFAULT_MAX_FRAME_BYTES)).unwrap();
    assert_eq!(listener.connections().active(), 0);
}

#[tokio::test]
async fn bind_replaces_a_stale_socket_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evr.sock");
    std::fs::write(&path, b"stale").unwrap();

    let listener = Listener::bind(&TransportConfig::new(&path, DEFAULT_MAX_FRAME_BYTES));
    assert!(listener.is_ok());
}

#[tokio::test]
async fn accepted_connections_are_dispatched_through_the_router() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("evr.sock");
    let listener = Listener::bind(&TransportConfig::new(&path, DEFAULT_MAX_FRAME_BYTES)).unwrap();

    let router = test_router();
    router.register_handler(Registration {
        module: "m".to_string(),
        function: "echo".to_string(),
        pattern: Pattern::compile("ping:me").unwrap(),
        priority: 50,
        filter: None,
        handler: HandlerFn::new(|_d, _c| async { Ok(json!({"pong": true})) }),
        params: vec![],
    });

    let shutdown = CancellationToken::new();
    let accept_shutdown = shutdown.clone();
    let accept_task = tokio::spawn(listener.run(router, accept_shutdown));

    let stream = UnixStream::connect(&path).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    write_half.write_all(b"{\"event\":\"ping:me\",\"data\":{}}\n").await.unwrap();

    let mut reader = BufReader::new(read_half);
    let mut line = String::new();
    reader.read_line(&mut line).await.unwrap();

    let value: serde_json::Value = serde_json::from_str(line.trim_end()).unwrap();
    assert_eq!(value["pong"], json!(true));

    shutdown.cancel();
    let _ = accept_task.await;
}
