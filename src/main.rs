//! Demonstration service wiring the telemetry toolkit into an axum app.
//!
//! ```text
//!   GET /api/users    handler instrumented as a database query
//!   GET /api/search   handler using the scoped timer
//!   GET /health       liveness probe
//!   GET /metrics      Prometheus exposition (uninstrumented)
//! ```
//!
//! Configuration comes from the environment: `SERVICE_NAME`, `LOG_LEVEL`,
//! `ENVIRONMENT`, `APP_VERSION`, plus `BIND_ADDRESS` for the listener
//! (default `0.0.0.0:8080`).

use axum::{extract::State, http::StatusCode, middleware, routing::get, Json, Router};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;

use service_telemetry::logging::Fields;
use service_telemetry::{
    instrument, log_info, logging_middleware, metrics_middleware, metrics_router, LogEmitter,
    MetricsRegistry, OpTimer, ServiceMetrics, TelemetryConfig,
};

#[derive(Clone)]
struct AppState {
    emitter: LogEmitter,
    metrics: ServiceMetrics,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = TelemetryConfig::from_env();
    let emitter = LogEmitter::new(&config, &config.service);

    let registry = MetricsRegistry::new();
    let metrics = ServiceMetrics::register(&registry, &config.service)?;

    log_info!(emitter, "Application starting", {
        "environment" => config.environment,
        "version" => config.version,
    });

    let state = AppState {
        emitter: emitter.clone(),
        metrics: metrics.clone(),
    };

    // route_layer so MatchedPath is available to the metrics middleware;
    // logging added last, so it is outermost and owns the trace scope.
    let app = Router::new()
        .route("/api/users", get(list_users))
        .route("/api/search", get(search))
        .route("/health", get(|| async { "ok" }))
        .with_state(state)
        .route_layer(middleware::from_fn_with_state(
            metrics.clone(),
            metrics_middleware,
        ))
        .route_layer(middleware::from_fn_with_state(
            emitter.clone(),
            logging_middleware,
        ))
        .merge(metrics_router(registry));

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = TcpListener::bind(&bind_address).await?;

    log_info!(emitter, "Listening for connections", {
        "address" => listener.local_addr()?.to_string(),
    });

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    log_info!(emitter, "Shutdown complete");
    Ok(())
}

/// Handler instrumented as a named database operation.
async fn list_users(State(state): State<AppState>) -> Result<Json<serde_json::Value>, StatusCode> {
    let mut context = Fields::new();
    context.insert("table".into(), json!("users"));

    let users = instrument(
        &state.emitter,
        &state.metrics,
        "database_query",
        context,
        fetch_users(),
    )
    .await
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(json!({ "users": users })))
}

async fn fetch_users() -> Result<Vec<&'static str>, std::io::Error> {
    // Stand-in for a real storage call.
    tokio::time::sleep(Duration::from_millis(5)).await;
    Ok(vec!["ada", "grace"])
}

/// Handler using the scoped timer around a block of work.
async fn search(State(state): State<AppState>) -> Json<serde_json::Value> {
    let mut context = Fields::new();
    context.insert("collection".into(), json!("documents"));

    let timer = OpTimer::start(&state.emitter, &state.metrics, "vector_search", context);
    tokio::time::sleep(Duration::from_millis(2)).await;
    timer.succeed();

    Json(json!({ "results": [] }))
}

/// Wait for shutdown signal (Ctrl+C).
async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler the server simply runs until killed.
        std::future::pending::<()>().await;
    }
}
