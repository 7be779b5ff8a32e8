// SPDX-License-Identifier: MIT

//! Transport-construction-time failures, distinct from the per-frame
//! wire errors `connection` folds into a response (§6/§7).
//!
//! Follows the per-crate `thiserror` `Error` enum convention used
//! throughout the workspace: one enum per crate, never a bare `String`.

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("failed to bind socket at {path}: {source}")]
    Bind { path: String, #[source] source: std::io::Error },

    #[error("failed to set socket permissions at {path}: {source}")]
    Permissions { path: String, #[source] source: std::io::Error },

    #[error("failed to remove stale socket at {path}: {source}")]
    StaleSocket { path: String, #[source] source: std::io::Error },
}
