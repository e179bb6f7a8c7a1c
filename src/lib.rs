//! Request observability toolkit for axum services.
//!
//! Instruments inbound HTTP requests with two correlated signals:
//! structured, trace-correlated log records and dimensional Prometheus
//! metrics. Every request gets a trace identifier that follows it through
//! middleware, handlers, and instrumented internal operations, without any
//! call site threading identifiers by hand.
//!
//! # Architecture Overview
//!
//! ```text
//!   Inbound request
//!       → logging middleware  (assign trace ID, "Incoming request" record)
//!       → metrics middleware  (active gauge ↑, request size)
//!       → application handler
//!           → instrument() / OpTimer  (internal operations)
//!       ← metrics middleware  (count, duration, response size, gauge ↓)
//!       ← logging middleware  ("Request completed" record, X-Trace-ID header)
//!
//!   Shared infrastructure:
//!       trace     task-local trace context
//!       logging   structured emitter (JSON / pretty), log sink
//!       metrics   registry, declared series, /metrics exposition
//!       config    environment-derived settings
//! ```

pub mod config;
pub mod error;
pub mod instrument;
pub mod logging;
pub mod metrics;
pub mod trace;

pub use config::TelemetryConfig;
pub use error::TelemetryError;
pub use instrument::{instrument, instrument_sync, OpTimer};
pub use logging::emitter::{CallSite, Level, LogEmitter, LogFormat, LogSink, MemoryLogs};
pub use logging::middleware::{logging_middleware, X_TRACE_ID};
pub use metrics::middleware::metrics_middleware;
pub use metrics::registry::{metrics_router, MetricsRegistry};
pub use metrics::series::ServiceMetrics;
pub use trace::TraceId;
