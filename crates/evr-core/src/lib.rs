// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! evr-core: shared types for the event router kernel.
//!
//! Everything here is deliberately free of any notion of "how an event
//! gets dispatched" — that lives in `evr-router`. This crate only defines
//! what an event *is*: its name and pattern grammar, its wire envelope,
//! the context threaded alongside a dispatch, stable identifiers, a
//! testable clock, and the error-kind taxonomy that crosses the wire.

pub mod clock;
pub mod connections;
pub mod envelope;
pub mod error;
pub mod id;
pub mod pattern;

pub use clock::{Clock, FakeClock, SystemClock};
pub use connections::{ConnectionCounter, ConnectionGuard};
pub use envelope::{ClientId, EmitContext, Envelope, Meta};
pub use error::{ErrorKind, RouterResult};
pub use id::short;
pub use pattern::Pattern;
