// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! evr-transport: the local stream transport (C7).
//!
//! Binds a Unix domain socket, accepts connections, and frames each one
//! as newline-delimited JSON request/response pairs over an in-process
//! [`evr_router::router::Router`]. Nothing here knows about event
//! patterns or handler dispatch — that is entirely `evr-router`'s job;
//! this crate only speaks bytes in and bytes out.

pub mod connection;
pub mod error;
pub mod frame;
pub mod listener;

pub use error::TransportError;
pub use frame::{FrameError, DEFAULT_MAX_FRAME_BYTES};
pub use listener::{Listener, TransportConfig};
