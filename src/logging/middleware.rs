//! Request logging middleware.
//!
//! Establishes the trace context for the whole downstream call chain,
//! emits the "Incoming request" and "Request completed" records, and
//! attaches the trace identifier to the response.
//!
//! State machine per request:
//! received → trace assigned → downstream pending → downstream returned
//! → completion logged. The middleware never changes the response status
//! or body; its only visible effect is the `X-Trace-ID` header.

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::Instant;

use crate::logging::emitter::{Level, LogEmitter};
use crate::trace::{self, TraceId};
use crate::{log_event, log_info};

/// Header carrying the trace identifier, inbound and outbound.
pub const X_TRACE_ID: &str = "x-trace-id";

/// Log the request lifecycle and propagate the trace context.
///
/// An inbound non-empty `X-Trace-ID` header is honored unchanged;
/// otherwise a fresh identifier is generated. The identifier is bound as a
/// task-local for everything the handler runs, so concurrently in-flight
/// requests can never observe each other's identifier.
pub async fn logging_middleware(
    State(emitter): State<LogEmitter>,
    request: Request,
    next: Next,
) -> Response {
    let trace_id = TraceId::assign(
        request
            .headers()
            .get(X_TRACE_ID)
            .and_then(|value| value.to_str().ok()),
    );

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let query = request.uri().query().map(str::to_string);
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip().to_string());
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let start = Instant::now();
    let mut response = trace::scope(trace_id.clone(), async move {
        log_info!(emitter, "Incoming request", {
            "method" => method,
            "path" => path,
            "query_params" => query,
            "client_ip" => client_ip,
            "user_agent" => user_agent,
        });

        let response = next.run(request).await;

        let duration_ms = round_ms(start.elapsed().as_secs_f64() * 1000.0);
        let status = response.status().as_u16();
        log_event!(emitter, Level::for_status(status), "Request completed", {
            "method" => method,
            "path" => path,
            "status_code" => status,
            "duration_ms" => duration_ms,
        });

        response
    })
    .await;

    // An identifier that cannot be encoded as a header value is dropped
    // rather than failing the response.
    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(X_TRACE_ID, value);
    }
    response
}

fn round_ms(duration_ms: f64) -> f64 {
    (duration_ms * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn completion_severity_follows_status_class() {
        assert_eq!(Level::for_status(200), Level::Info);
        assert_eq!(Level::for_status(304), Level::Info);
        assert_eq!(Level::for_status(404), Level::Warning);
        assert_eq!(Level::for_status(503), Level::Error);
    }

    #[test]
    fn durations_are_rounded_to_hundredths() {
        assert_eq!(round_ms(41.996), 42.0);
        assert_eq!(round_ms(0.123), 0.12);
    }
}
