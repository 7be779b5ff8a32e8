// SPDX-License-Identifier: MIT

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! evr-router: the event routing and transformation kernel.
//!
//! Seven collaborating pieces, leaves-first:
//!
//! - [`Pattern`] re-exports `evr_core`'s pattern matcher (C1).
//! - [`registry`] — the handler registry (C2).
//! - [`condition`] — the transformer condition sublanguage.
//! - [`transformer`] — the declarative transformer engine (C3).
//! - [`router`] — the `emit` dispatch algorithm (C4).
//! - [`supervisor`] — named background task tracking (C5).
//! - [`shutdown`] — the two-phase shutdown coordinator (C6).
//! - [`builtins`] — the built-in `system:*` and `router:*` events.
//!
//! Nothing here knows about sockets or frames; that is `evr-transport`'s
//! job. A `Router` is a plain in-process object, constructed once and
//! shared via `Arc`, never a hidden global (see DESIGN.md).

pub mod builtins;
pub mod condition;
pub mod discover;
pub mod error;
pub mod handler;
pub mod mapping;
pub mod middleware;
pub mod registry;
pub mod router;
pub mod shutdown;
pub mod supervisor;
pub mod transformer;

pub use discover::ParamSpec;
pub use error::{wire_error, RouterError};
pub use evr_core::pattern::{Pattern, PatternError};
pub use handler::{BoxFuture, Handler, HandlerFn};
pub use middleware::{Middleware, MiddlewareFn, MiddlewareOutcome};
pub use registry::{HandlerId, Registry};
pub use router::{ErrorMode, Router, RouterConfig};
pub use shutdown::{ShutdownCoordinator, ShutdownSummary};
pub use supervisor::{TaskInfo, TaskSupervisor};
pub use transformer::{ResponseRoute, TransformerEngine, TransformerId, TransformerRule};

/// Priority assigned to a handler that registers without specifying one.
///
/// 0 is highest priority, 100 is lowest; see I1 and §9's priority note.
pub const DEFAULT_PRIORITY: u8 = 50;

/// Default cap on emission recursion depth (I2 / `KSI_EMIT_DEPTH_MAX`).
pub const DEFAULT_EMIT_DEPTH_MAX: u32 = 10;

/// Default async-transformer correlation TTL (§4.3), in seconds.
pub const DEFAULT_CORRELATION_TTL_SECS: u64 = 600;
