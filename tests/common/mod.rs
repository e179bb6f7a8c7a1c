//! Shared harness for the integration tests: a small axum app wired with
//! both telemetry middlewares, an in-memory log sink, and its own metric
//! registry.

use axum::{
    extract::Path,
    http::StatusCode,
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use std::time::Duration;

use service_telemetry::{
    logging_middleware, metrics_middleware, metrics_router, LogEmitter, LogSink, MemoryLogs,
    MetricsRegistry, ServiceMetrics, TelemetryConfig,
};

pub const SERVICE: &str = "test-service";

pub struct TestApp {
    pub app: Router,
    pub logs: MemoryLogs,
    pub metrics: ServiceMetrics,
    pub registry: MetricsRegistry,
}

pub fn build_app() -> TestApp {
    let config = TelemetryConfig {
        service: SERVICE.to_string(),
        log_level: "DEBUG".to_string(),
        environment: "production".to_string(),
        version: "1.0.0".to_string(),
    };

    let (sink, logs) = LogSink::memory();
    let emitter = LogEmitter::with_sink(&config, "http", sink);

    let registry = MetricsRegistry::new();
    let metrics = ServiceMetrics::register(&registry, SERVICE).expect("series register once");

    let app = Router::new()
        .route("/api/users", get(list_users))
        .route("/api/items/{id}", get(show_item))
        .route("/api/items", post(create_item))
        .route("/api/fail", get(fail))
        .route("/api/slow", get(slow))
        .route("/api/trace", get(current_trace))
        .route_layer(middleware::from_fn_with_state(
            metrics.clone(),
            metrics_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            emitter.clone(),
            logging_middleware,
        ))
        .merge(metrics_router(registry.clone()));

    TestApp {
        app,
        logs,
        metrics,
        registry,
    }
}

async fn list_users() -> Json<serde_json::Value> {
    Json(json!({ "users": ["ada", "grace"] }))
}

async fn show_item(Path(id): Path<u32>) -> Json<serde_json::Value> {
    Json(json!({ "id": id }))
}

async fn create_item(body: String) -> (StatusCode, String) {
    (StatusCode::CREATED, body)
}

async fn fail() -> (StatusCode, &'static str) {
    (StatusCode::SERVICE_UNAVAILABLE, "overloaded")
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(30)).await;
    "done"
}

/// Exposes the handler's view of the task-local trace context.
async fn current_trace() -> String {
    service_telemetry::trace::current()
        .map(|id| id.as_str().to_string())
        .unwrap_or_default()
}
