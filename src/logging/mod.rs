//! Structured logging subsystem.
//!
//! # Data Flow
//! ```text
//! call sites (macros, middleware, instrument helpers)
//!     → emitter.rs (merge reserved fields + trace ID, format record)
//!     → LogSink (one atomic line write per record)
//!
//! middleware.rs wraps the request lifecycle:
//!     assign trace ID → "Incoming request" → handler → "Request completed"
//! ```
//!
//! # Design Decisions
//! - One JSON object per line in production, human-readable line in
//!   development; selected once at startup from configuration
//! - Reserved record keys always win over caller-supplied fields
//! - A log call never fails and never panics; serialization problems
//!   degrade to string rendering

pub mod emitter;
pub mod middleware;

pub use emitter::{CallSite, Fields, Level, LogEmitter, LogFormat, LogSink, MemoryLogs};
pub use middleware::{logging_middleware, X_TRACE_ID};
