// SPDX-License-Identifier: MIT

//! Accept loop for the local stream transport (C7).
//!
//! Socket bind follows a stale-socket-removal-then-bind sequence, done
//! last after every other startup step so an early failure never leaves
//! a half-initialized socket file behind.

use crate::connection::handle_connection;
use crate::error::TransportError;
use evr_core::{Clock, ConnectionCounter};
use evr_router::router::Router;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::UnixListener;
use tokio_util::sync::CancellationToken;

/// Construction-time transport configuration.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub socket_path: PathBuf,
    pub max_frame_bytes: usize,
}

impl TransportConfig {
    pub fn new(socket_path: impl Into<PathBuf>, max_frame_bytes: usize) -> Self {
        Self { socket_path: socket_path.into(), max_frame_bytes }
    }
}

/// The bound local stream socket, ready to accept connections.
pub struct Listener {
    inner: UnixListener,
    socket_path: PathBuf,
    max_frame_bytes: usize,
    connections: ConnectionCounter,
}

impl Listener {
    /// Remove a stale socket file left behind by a previous run, bind a
    /// fresh one, and restrict it to owner-only access (mode 0600) — in
    /// that order, so a bind failure never leaves a socket with the
    /// wrong permissions for something else to connect to.
    pub fn bind(config: &TransportConfig) -> Result<Self, TransportError> {
        remove_stale_socket(&config.socket_path)?;

        let inner = UnixListener::bind(&config.socket_path)
            .map_err(|source| TransportError::Bind { path: config.socket_path.display().to_string(), source })?;

        std::fs::set_permissions(&config.socket_path, std::fs::Permissions::from_mode(0o600)).map_err(|source| {
            TransportError::Permissions { path: config.socket_path.display().to_string(), source }
        })?;

        Ok(Self {
            inner,
            socket_path: config.socket_path.clone(),
            max_frame_bytes: config.max_frame_bytes,
            connections: ConnectionCounter::new(),
        })
    }

    /// A clone of this listener's connection counter. `evr-daemon` attaches
    /// this to the router's [`ShutdownCoordinator`](evr_router::shutdown::ShutdownCoordinator)
    /// so the termination summary can report how many connections were
    /// still in flight at shutdown.
    pub fn connections(&self) -> ConnectionCounter {
        self.connections.clone()
    }

    /// Accept connections until `shutdown` fires, spawning one task per
    /// connection. Each connection task outlives this loop — `run`
    /// returns as soon as no more new connections will be accepted, not
    /// once every in-flight connection has finished (the shutdown
    /// coordinator tracks those separately via the supervisor).
    pub async fn run<C: Clock + 'static>(self, router: Arc<Router<C>>, shutdown: CancellationToken) {
        tracing::info!(socket = %self.socket_path.display(), "listening");
        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("transport accept loop stopping");
                    return;
                }
                accepted = self.inner.accept() => {
                    match accepted {
                        Ok((stream, _addr)) => {
                            let router = router.clone();
                            let max_frame_bytes = self.max_frame_bytes;
                            let guard = self.connections.guard();
                            tokio::spawn(async move {
                                let _guard = guard;
                                let (read_half, write_half) = stream.into_split();
                                let reader = BufReader::new(read_half);
                                handle_connection(reader, write_half, router, max_frame_bytes).await;
                            });
                        }
                        Err(err) => tracing::error!(error = %err, "accept error"),
                    }
                }
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

fn remove_stale_socket(path: &Path) -> Result<(), TransportError> {
    if path.exists() {
        std::fs::remove_file(path)
            .map_err(|source| TransportError::StaleSocket { path: path.display().to_string(), source })?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
