// SPDX-License-Identifier: MIT

//! Centralized environment variable access for the daemon crate.
//!
//! One function per variable, each with its documented default, rather
//! than a single `envy`-style struct deserialize — callers read
//! through `Config`, not raw `std::env::var` calls.

use evr_router::{ErrorMode, DEFAULT_EMIT_DEPTH_MAX};
use evr_transport::DEFAULT_MAX_FRAME_BYTES;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::DaemonError;

/// Resolve the default socket path: `$XDG_RUNTIME_DIR/daemon.sock` when
/// set, falling back to `/tmp/evr/daemon.sock` otherwise (most local
/// stream socket daemons fall back to `/tmp` rather than erroring when
/// no runtime dir is configured).
fn default_socket_path() -> PathBuf {
    if let Ok(dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(dir).join("daemon.sock");
    }
    PathBuf::from("/tmp/evr/daemon.sock")
}

/// Process configuration, assembled once at startup from the
/// environment (§6) and threaded explicitly through `run` — never read
/// a second time mid-process.
#[derive(Debug, Clone)]
pub struct Config {
    pub socket_path: PathBuf,
    pub error_mode: ErrorMode,
    pub max_frame_bytes: usize,
    pub emit_depth_max: u32,
    pub correlation_ttl: Duration,
    pub shutdown_grace: Duration,
}

impl Config {
    /// Load every setting from the environment, applying the documented
    /// defaults for anything unset.
    pub fn from_env() -> Result<Self, DaemonError> {
        let socket_path =
            std::env::var("KSI_SOCKET").map(PathBuf::from).unwrap_or_else(|_| default_socket_path());

        let error_mode = match std::env::var("KSI_ERROR_MODE").ok().as_deref() {
            None | Some("catch") => ErrorMode::Catch,
            Some("propagate") => ErrorMode::Propagate,
            Some(other) => {
                return Err(DaemonError::InvalidEnv {
                    var: "KSI_ERROR_MODE",
                    detail: format!("expected 'catch' or 'propagate', got '{other}'"),
                })
            }
        };

        let max_frame_bytes = parse_env_usize("KSI_MAX_FRAME_BYTES", DEFAULT_MAX_FRAME_BYTES)?;
        let emit_depth_max = parse_env_u32("KSI_EMIT_DEPTH_MAX", DEFAULT_EMIT_DEPTH_MAX)?;
        let correlation_ttl = Duration::from_secs(parse_env_u64(
            "EVR_CORRELATION_TTL_SECS",
            evr_router::DEFAULT_CORRELATION_TTL_SECS,
        )?);
        let shutdown_grace = Duration::from_secs(parse_env_u64("EVR_SHUTDOWN_GRACE_SECS", 30)?);

        Ok(Self { socket_path, error_mode, max_frame_bytes, emit_depth_max, correlation_ttl, shutdown_grace })
    }
}

fn parse_env_usize(var: &'static str, default: usize) -> Result<usize, DaemonError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| DaemonError::InvalidEnv { var, detail: format!("not a number: '{raw}'") }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u32(var: &'static str, default: u32) -> Result<u32, DaemonError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| DaemonError::InvalidEnv { var, detail: format!("not a number: '{raw}'") }),
        Err(_) => Ok(default),
    }
}

fn parse_env_u64(var: &'static str, default: u64) -> Result<u64, DaemonError> {
    match std::env::var(var) {
        Ok(raw) => raw.parse().map_err(|_| DaemonError::InvalidEnv { var, detail: format!("not a number: '{raw}'") }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
