// SPDX-License-Identifier: MIT

//! Process-level startup failures (§6 exit codes), distinct from the
//! per-frame wire errors the transport folds into a response.
//!
//! Follows the per-crate `thiserror` `Error` enum convention used
//! throughout the workspace: one enum per crate, never a bare `String`.

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("failed to create state directory {path}: {source}")]
    StateDir { path: String, #[source] source: std::io::Error },

    #[error(transparent)]
    Transport(#[from] evr_transport::TransportError),

    #[error("invalid {var}: {detail}")]
    InvalidEnv { var: &'static str, detail: String },
}

impl DaemonError {
    /// §6 exit code: every startup failure this type can represent is a
    /// "fatal startup error" (2), never the "router invariant violation"
    /// code (3) — that one only fires when a running router observes
    /// its own invariant broken, not during bootstrap.
    pub fn exit_code(&self) -> i32 {
        2
    }
}
