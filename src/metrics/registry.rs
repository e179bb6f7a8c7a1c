//! Metric registry and exposition.
//!
//! A thin, explicit wrapper around the `prometheus` crate: series are
//! defined once at startup through `define_*` and observed through the
//! returned vec handles (`with_label_values` parameterizes a series with
//! one label-value tuple per time series).

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use prometheus::{
    proto::MetricFamily, Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts,
    Registry, TextEncoder,
};

use crate::error::Result;

/// Process-wide metric registry.
///
/// Constructed once at startup and shared via cheap clones; all clones
/// point at the same underlying registry.
#[derive(Clone, Default)]
pub struct MetricsRegistry {
    inner: Registry,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Define and register a counter series.
    ///
    /// `label_names` is fixed here; every observation must supply exactly
    /// that many values, in that order.
    pub fn define_counter(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
    ) -> Result<IntCounterVec> {
        let counter = IntCounterVec::new(Opts::new(name, help), label_names)?;
        self.inner.register(Box::new(counter.clone()))?;
        Ok(counter)
    }

    /// Define and register a histogram series with fixed, ascending bucket
    /// boundaries.
    pub fn define_histogram(
        &self,
        name: &str,
        help: &str,
        label_names: &[&str],
        buckets: &[f64],
    ) -> Result<HistogramVec> {
        let opts = HistogramOpts::new(name, help).buckets(buckets.to_vec());
        let histogram = HistogramVec::new(opts, label_names)?;
        self.inner.register(Box::new(histogram.clone()))?;
        Ok(histogram)
    }

    /// Define and register a gauge series.
    pub fn define_gauge(&self, name: &str, help: &str, label_names: &[&str]) -> Result<IntGaugeVec> {
        let gauge = IntGaugeVec::new(Opts::new(name, help), label_names)?;
        self.inner.register(Box::new(gauge.clone()))?;
        Ok(gauge)
    }

    /// Gather the current state of every registered series.
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.inner.gather()
    }

    /// Render all series in the Prometheus text exposition format.
    ///
    /// Returns the body and its content type.
    pub fn snapshot(&self) -> Result<(Vec<u8>, &'static str)> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.inner.gather(), &mut buffer)?;
        Ok((buffer, prometheus::TEXT_FORMAT))
    }
}

/// Router serving `GET /metrics` from the given registry.
///
/// Merge into the application router; the scrape route itself is left
/// uninstrumented.
pub fn metrics_router(registry: MetricsRegistry) -> Router {
    Router::new()
        .route("/metrics", get(serve_metrics))
        .with_state(registry)
}

async fn serve_metrics(State(registry): State<MetricsRegistry>) -> Response {
    match registry.snapshot() {
        Ok((body, content_type)) => {
            ([(header::CONTENT_TYPE, content_type)], body).into_response()
        }
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("metrics encoding failed: {err}"),
        )
            .into_response(),
    }
}
