// SPDX-License-Identifier: MIT

//! evr-daemon: process bootstrap for the event router kernel.
//!
//! Wires `evr-core`/`evr-router`/`evr-transport` into a running process:
//! config-from-environment (§6), `tracing` setup, signal handling, and
//! the `Router`/`Listener` construction §9 describes — constructed once
//! in [`run`] and threaded via `Arc`, never a hidden global.

pub mod config;
pub mod error;

pub use config::Config;
pub use error::DaemonError;

use evr_core::SystemClock;
use evr_router::builtins::register_builtin_handlers;
use evr_router::router::{Router, RouterConfig};
use evr_transport::{Listener, TransportConfig};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Run the daemon to completion: bind the transport, accept connections
/// until a shutdown is initiated (by signal or an internal
/// `system:shutdown` emission), then return the process exit code (§6).
pub async fn run(config: Config) -> Result<i32, DaemonError> {
    let router_config = RouterConfig {
        clock: SystemClock,
        error_mode: config.error_mode,
        depth_max: config.emit_depth_max,
        shutdown_grace: config.shutdown_grace,
        correlation_ttl: config.correlation_ttl,
    };
    let router: Arc<Router<SystemClock>> = Router::new(router_config);
    register_builtin_handlers(&router);

    if let Some(parent) = config.socket_path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|source| DaemonError::StateDir { path: parent.display().to_string(), source })?;
    }

    let transport_config = TransportConfig::new(config.socket_path.clone(), config.max_frame_bytes);
    let listener = Listener::bind(&transport_config)?;
    router.shutdown_coordinator().attach_connections(listener.connections());

    let shutdown_token = CancellationToken::new();
    let exit_code = Arc::new(AtomicI32::new(0));
    spawn_signal_watcher(router.clone(), shutdown_token.clone(), exit_code.clone());
    spawn_shutdown_completion_watcher(router.clone(), shutdown_token.clone(), exit_code.clone());

    listener.run(router, shutdown_token).await;

    Ok(exit_code.load(Ordering::SeqCst))
}

/// Watch for SIGTERM/SIGINT and translate the first one into a
/// `system:shutdown` emission — the same coordinated path
/// `router:emit("system:shutdown", ...)` would take if a handler
/// requested shutdown itself (§4.6 step 1).
fn spawn_signal_watcher(router: Arc<Router<SystemClock>>, shutdown_token: CancellationToken, exit_code: Arc<AtomicI32>) {
    tokio::spawn(async move {
        wait_for_termination_signal().await;
        tracing::info!("termination signal received, starting coordinated shutdown");
        router.emit("system:shutdown", serde_json::json!({}), None).await;
        if let Some(code) = router.shutdown_coordinator().completion_exit_code() {
            if !shutdown_token.is_cancelled() {
                exit_code.store(code, Ordering::SeqCst);
            }
        }
        shutdown_token.cancel();
    });
}

/// Watch for shutdown completing by any other path — most notably a
/// client emitting `system:shutdown` directly over the socket (S6) —
/// and stop the accept loop once it has. `ShutdownCoordinator::begin`
/// runs inside whichever `emit` call triggered it, which this bootstrap
/// code is not a party to, so it polls for completion rather than
/// awaiting a future it doesn't own.
fn spawn_shutdown_completion_watcher(router: Arc<Router<SystemClock>>, shutdown_token: CancellationToken, exit_code: Arc<AtomicI32>) {
    tokio::spawn(async move {
        let coordinator = router.shutdown_coordinator().clone();
        while !coordinator.is_complete() {
            if shutdown_token.is_cancelled() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        if let Some(code) = coordinator.completion_exit_code() {
            if !shutdown_token.is_cancelled() {
                exit_code.store(code, Ordering::SeqCst);
            }
        }
        shutdown_token.cancel();
    });
}

#[cfg(unix)]
async fn wait_for_termination_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(err) => {
            tracing::error!(error = %err, "failed to install SIGTERM handler");
            std::future::pending::<()>().await;
            unreachable!()
        }
    };
    tokio::select! {
        _ = sigterm.recv() => {}
        _ = tokio::signal::ctrl_c() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_termination_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
