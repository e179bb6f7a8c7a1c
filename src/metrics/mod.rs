//! Metrics subsystem.
//!
//! # Data Flow
//! ```text
//! middleware.rs / instrument helpers / application code
//!     → series.rs (declared counter/histogram/gauge handles)
//!     → registry.rs (MetricsRegistry, accumulation)
//!
//! Prometheus scrape:
//!     GET /metrics → registry.rs snapshot (text exposition format)
//! ```
//!
//! # Design Decisions
//! - Series are declared once at startup; the registry is append-only
//! - Accumulation is atomic per observation (prometheus crate internals),
//!   so concurrent requests never lose updates
//! - Label values must come from bounded sets (method, route template,
//!   status code, declared enums). This is a caller obligation the
//!   registry cannot enforce; unbounded values (raw paths, user input)
//!   explode the number of time series

pub mod middleware;
pub mod registry;
pub mod series;

pub use middleware::metrics_middleware;
pub use registry::{metrics_router, MetricsRegistry};
pub use series::{ActiveRequestGuard, Outcome, ServiceMetrics};
