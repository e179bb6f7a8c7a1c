//! Declared metric series.
//!
//! Names, label sets, and histogram buckets are an external contract:
//! dashboards and alerts depend on them. Series are defined once at
//! startup against a [`MetricsRegistry`]; everything here is a cheap
//! cloneable handle.

use prometheus::{HistogramVec, IntCounterVec, IntGauge, IntGaugeVec};
use std::sync::Arc;

use crate::error::Result;
use crate::metrics::registry::MetricsRegistry;

/// Request latency buckets (seconds).
const LATENCY_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0];

/// Payload size buckets (bytes).
const SIZE_BUCKETS: &[f64] = &[
    100.0, 1_000.0, 5_000.0, 10_000.0, 50_000.0, 100_000.0, 500_000.0, 1_000_000.0,
];

const DB_QUERY_BUCKETS: &[f64] = &[0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0];
const SEARCH_BUCKETS: &[f64] = &[0.01, 0.05, 0.1, 0.5, 1.0, 2.0, 5.0, 10.0];
const SEARCH_RESULT_BUCKETS: &[f64] = &[1.0, 5.0, 10.0, 20.0, 50.0, 100.0, 500.0];
const DOCUMENT_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0];
const CHUNK_BUCKETS: &[f64] = &[1.0, 5.0, 10.0, 20.0, 50.0, 100.0, 500.0, 1_000.0];
const BATCH_BUCKETS: &[f64] = &[0.1, 0.5, 1.0, 2.0, 5.0, 10.0, 30.0];
const LLM_BUCKETS: &[f64] = &[0.5, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0];
const OPERATION_BUCKETS: &[f64] = &[0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0];

/// Outcome label for instrumented operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    Error,
}

impl Outcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Outcome::Success => "success",
            Outcome::Error => "error",
        }
    }
}

/// All series this service records, defined once at startup.
///
/// HTTP series are fed by the middleware; the domain series (storage,
/// search, document processing, LLM calls) are for application code and
/// the instrument helpers. Endpoint labels must be route templates, not
/// raw paths (see the module documentation on cardinality).
#[derive(Clone)]
pub struct ServiceMetrics {
    service: Arc<str>,

    // HTTP request lifecycle
    pub http_requests_total: IntCounterVec,
    pub http_request_duration_seconds: HistogramVec,
    pub http_request_size_bytes: HistogramVec,
    pub http_response_size_bytes: HistogramVec,
    pub http_requests_active: IntGaugeVec,

    // Storage
    pub db_query_duration_seconds: HistogramVec,
    pub db_connection_pool_size: IntGaugeVec,

    // Vector search
    pub vector_search_duration_seconds: HistogramVec,
    pub vector_search_results_count: HistogramVec,

    // Document processing
    pub document_processing_duration_seconds: HistogramVec,
    pub document_chunks_count: HistogramVec,

    // Batch query pipeline
    pub batch_query_duration_seconds: HistogramVec,
    pub batch_queries_total: IntCounterVec,

    // External LLM APIs
    pub llm_api_calls_total: IntCounterVec,
    pub llm_api_duration_seconds: HistogramVec,
    pub llm_tokens_used_total: IntCounterVec,

    // Generic instrumented operations
    pub operation_duration_seconds: HistogramVec,
}

impl ServiceMetrics {
    /// Define and register every series. Fails on name collisions within
    /// the registry, so call once per process.
    pub fn register(registry: &MetricsRegistry, service: &str) -> Result<Self> {
        Ok(Self {
            service: Arc::from(service),

            http_requests_total: registry.define_counter(
                "http_requests_total",
                "Total number of HTTP requests",
                &["method", "endpoint", "status_code", "service"],
            )?,
            http_request_duration_seconds: registry.define_histogram(
                "http_request_duration_seconds",
                "Duration of HTTP requests in seconds",
                &["method", "endpoint", "status_code", "service"],
                LATENCY_BUCKETS,
            )?,
            http_request_size_bytes: registry.define_histogram(
                "http_request_size_bytes",
                "Size of HTTP requests in bytes",
                &["method", "endpoint", "service"],
                SIZE_BUCKETS,
            )?,
            http_response_size_bytes: registry.define_histogram(
                "http_response_size_bytes",
                "Size of HTTP responses in bytes",
                &["method", "endpoint", "status_code", "service"],
                SIZE_BUCKETS,
            )?,
            http_requests_active: registry.define_gauge(
                "http_requests_active",
                "Number of active HTTP requests",
                &["service"],
            )?,

            db_query_duration_seconds: registry.define_histogram(
                "db_query_duration_seconds",
                "Duration of database queries in seconds",
                &["operation", "table"],
                DB_QUERY_BUCKETS,
            )?,
            db_connection_pool_size: registry.define_gauge(
                "db_connection_pool_size",
                "Current database connection pool size",
                &["database", "state"],
            )?,

            vector_search_duration_seconds: registry.define_histogram(
                "vector_search_duration_seconds",
                "Duration of vector search operations",
                &["collection", "operation"],
                SEARCH_BUCKETS,
            )?,
            vector_search_results_count: registry.define_histogram(
                "vector_search_results_count",
                "Number of results from vector search",
                &["collection"],
                SEARCH_RESULT_BUCKETS,
            )?,

            document_processing_duration_seconds: registry.define_histogram(
                "document_processing_duration_seconds",
                "Duration of document processing",
                &["document_type", "status"],
                DOCUMENT_BUCKETS,
            )?,
            document_chunks_count: registry.define_histogram(
                "document_chunks_count",
                "Number of chunks created from document",
                &["document_type"],
                CHUNK_BUCKETS,
            )?,

            batch_query_duration_seconds: registry.define_histogram(
                "batch_query_duration_seconds",
                "Duration of batch query pipeline runs",
                &["status"],
                BATCH_BUCKETS,
            )?,
            batch_queries_total: registry.define_counter(
                "batch_queries_total",
                "Total number of batch query pipeline runs",
                &["status"],
            )?,

            llm_api_calls_total: registry.define_counter(
                "llm_api_calls_total",
                "Total number of LLM API calls",
                &["provider", "model", "status"],
            )?,
            llm_api_duration_seconds: registry.define_histogram(
                "llm_api_duration_seconds",
                "Duration of LLM API calls",
                &["provider", "model"],
                LLM_BUCKETS,
            )?,
            llm_tokens_used_total: registry.define_counter(
                "llm_tokens_used_total",
                "Total number of tokens used",
                &["provider", "model", "type"],
            )?,

            operation_duration_seconds: registry.define_histogram(
                "operation_duration_seconds",
                "Duration of instrumented operations",
                &["operation", "status"],
                OPERATION_BUCKETS,
            )?,
        })
    }

    /// Service label applied to the HTTP series.
    pub fn service(&self) -> &str {
        &self.service
    }

    /// Mark one request in flight; the gauge is decremented when the
    /// returned guard drops, on every exit path.
    pub fn track_active_request(&self) -> ActiveRequestGuard {
        let gauge = self.http_requests_active.with_label_values(&[&self.service]);
        gauge.inc();
        ActiveRequestGuard { gauge }
    }

    /// Current in-flight request count for this service.
    pub fn active_requests(&self) -> i64 {
        self.http_requests_active
            .with_label_values(&[&self.service])
            .get()
    }

    /// Record an instrumented operation outcome.
    pub fn record_operation(&self, operation: &str, outcome: Outcome, duration_secs: f64) {
        self.operation_duration_seconds
            .with_label_values(&[operation, outcome.as_str()])
            .observe(duration_secs);
    }

    /// Update the connection pool gauge for one database.
    pub fn set_db_connection_pool(&self, database: &str, total: i64, idle: i64, active: i64) {
        for (state, value) in [("total", total), ("idle", idle), ("active", active)] {
            self.db_connection_pool_size
                .with_label_values(&[database, state])
                .set(value);
        }
    }
}

/// RAII guard for the active-requests gauge.
pub struct ActiveRequestGuard {
    gauge: IntGauge,
}

impl Drop for ActiveRequestGuard {
    fn drop(&mut self) {
        self.gauge.dec();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> ServiceMetrics {
        let registry = MetricsRegistry::new();
        ServiceMetrics::register(&registry, "test-service").unwrap()
    }

    #[test]
    fn all_series_register_once() {
        let registry = MetricsRegistry::new();
        let metrics = ServiceMetrics::register(&registry, "svc").unwrap();
        assert_eq!(metrics.service(), "svc");

        // gather() only reports families with at least one child series,
        // so observe one sample before checking the family is wired in.
        metrics
            .http_requests_total
            .with_label_values(&["GET", "/api/users", "200", "svc"])
            .inc();
        assert!(registry
            .gather()
            .iter()
            .any(|family| family.get_name() == "http_requests_total"));

        // The registry is append-only; a second registration collides.
        assert!(ServiceMetrics::register(&registry, "svc").is_err());
    }

    #[test]
    fn active_request_guard_restores_the_gauge() {
        let metrics = metrics();
        assert_eq!(metrics.active_requests(), 0);

        let outer = metrics.track_active_request();
        let inner = metrics.track_active_request();
        assert_eq!(metrics.active_requests(), 2);

        drop(inner);
        assert_eq!(metrics.active_requests(), 1);
        drop(outer);
        assert_eq!(metrics.active_requests(), 0);
    }

    #[test]
    fn guard_decrements_on_panic_unwind() {
        let metrics = metrics();
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = metrics.track_active_request();
            panic!("handler blew up");
        }));
        assert!(result.is_err());
        assert_eq!(metrics.active_requests(), 0);
    }

    #[test]
    fn operation_outcomes_land_under_their_status_label() {
        let metrics = metrics();
        metrics.record_operation("database_query", Outcome::Success, 0.02);
        metrics.record_operation("database_query", Outcome::Error, 0.01);
        metrics.record_operation("database_query", Outcome::Error, 0.01);

        let success = metrics
            .operation_duration_seconds
            .with_label_values(&["database_query", "success"]);
        let error = metrics
            .operation_duration_seconds
            .with_label_values(&["database_query", "error"]);
        assert_eq!(success.get_sample_count(), 1);
        assert_eq!(error.get_sample_count(), 2);
    }

    #[test]
    fn db_pool_gauge_tracks_each_state() {
        let metrics = metrics();
        metrics.set_db_connection_pool("main", 20, 5, 15);
        let pool = |state: &str| {
            metrics
                .db_connection_pool_size
                .with_label_values(&["main", state])
                .get()
        };
        assert_eq!(pool("total"), 20);
        assert_eq!(pool("idle"), 5);
        assert_eq!(pool("active"), 15);
    }
}
