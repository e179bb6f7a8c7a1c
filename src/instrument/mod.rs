//! Generic instrumentation helpers.
//!
//! Apply the middleware's start/success/failure/duration pattern to named
//! operations outside the HTTP path, such as database queries, external
//! API calls, and batch jobs. Two equivalent shapes over one outcome
//! recorder:
//!
//! - [`instrument`] / [`instrument_sync`] wrap a unit of work (a future or
//!   a closure) producing a `Result`;
//! - [`OpTimer`] brackets a scope of work and guarantees the duration and
//!   outcome are recorded on every exit path, including early returns and
//!   cancellation.
//!
//! Failures are logged with the error's type and message, recorded under
//! the error status label, and handed back to the caller unchanged;
//! instrumentation never converts a success into a failure or vice versa.

use std::fmt::Display;
use std::future::Future;
use std::time::Instant;

use crate::callsite;
use crate::logging::emitter::{field, Fields, Level, LogEmitter};
use crate::metrics::series::{Outcome, ServiceMetrics};

/// Wrap an asynchronous unit of work with start/outcome logs and a
/// duration observation under `operation_duration_seconds`.
///
/// `context` fields are attached to every record for the operation. The
/// result is returned untouched.
pub async fn instrument<F, T, E>(
    emitter: &LogEmitter,
    metrics: &ServiceMetrics,
    operation: &str,
    context: Fields,
    work: F,
) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let span = OperationSpan::begin(emitter, metrics, operation, context);
    match work.await {
        Ok(value) => {
            span.success();
            Ok(value)
        }
        Err(error) => {
            span.failure(short_type_name::<E>(), &error.to_string());
            Err(error)
        }
    }
}

/// Synchronous twin of [`instrument`] for immediately-returning work.
pub fn instrument_sync<F, T, E>(
    emitter: &LogEmitter,
    metrics: &ServiceMetrics,
    operation: &str,
    context: Fields,
    work: F,
) -> Result<T, E>
where
    F: FnOnce() -> Result<T, E>,
    E: Display,
{
    let span = OperationSpan::begin(emitter, metrics, operation, context);
    match work() {
        Ok(value) => {
            span.success();
            Ok(value)
        }
        Err(error) => {
            span.failure(short_type_name::<E>(), &error.to_string());
            Err(error)
        }
    }
}

/// Scoped timer for a block of work.
///
/// Starting the timer emits the debug record and captures the clock. Call
/// [`OpTimer::succeed`] on the success path or [`OpTimer::fail`] with the
/// error; if the timer is dropped without either (an early `?` return, a
/// panic, or a cancelled task), the error outcome is recorded with a fixed
/// reason so the duration is never lost.
pub struct OpTimer {
    span: Option<OperationSpan>,
}

impl OpTimer {
    pub fn start(
        emitter: &LogEmitter,
        metrics: &ServiceMetrics,
        operation: &str,
        context: Fields,
    ) -> Self {
        Self {
            span: Some(OperationSpan::begin(emitter, metrics, operation, context)),
        }
    }

    /// Record the success outcome.
    pub fn succeed(mut self) {
        if let Some(span) = self.span.take() {
            span.success();
        }
    }

    /// Record the failure outcome with the error's type and message.
    pub fn fail<E: Display>(mut self, error: &E) {
        if let Some(span) = self.span.take() {
            span.failure(short_type_name::<E>(), &error.to_string());
        }
    }
}

impl Drop for OpTimer {
    fn drop(&mut self) {
        if let Some(span) = self.span.take() {
            span.failure("Interrupted", "operation scope exited before completion");
        }
    }
}

/// Shared state behind both helper shapes: one started operation.
struct OperationSpan {
    emitter: LogEmitter,
    metrics: ServiceMetrics,
    operation: String,
    context: Fields,
    start: Instant,
}

impl OperationSpan {
    fn begin(
        emitter: &LogEmitter,
        metrics: &ServiceMetrics,
        operation: &str,
        context: Fields,
    ) -> Self {
        let span = Self {
            emitter: emitter.clone(),
            metrics: metrics.clone(),
            operation: operation.to_string(),
            context,
            start: Instant::now(),
        };
        span.emit(
            Level::Debug,
            &format!("Starting {}", span.operation),
            Fields::new(),
        );
        span
    }

    fn success(self) {
        let duration_secs = self.start.elapsed().as_secs_f64();
        let mut fields = Fields::new();
        fields.insert("duration_ms".into(), field(round_ms(duration_secs * 1000.0)));
        fields.insert("status".into(), field(Outcome::Success.as_str()));
        self.emit(
            Level::Info,
            &format!("Completed {}", self.operation),
            fields,
        );
        self.metrics
            .record_operation(&self.operation, Outcome::Success, duration_secs);
    }

    fn failure(self, error_type: &str, error: &str) {
        let duration_secs = self.start.elapsed().as_secs_f64();
        let mut fields = Fields::new();
        fields.insert("duration_ms".into(), field(round_ms(duration_secs * 1000.0)));
        fields.insert("status".into(), field(Outcome::Error.as_str()));
        fields.insert("error".into(), field(error));
        fields.insert("error_type".into(), field(error_type));
        self.emit(Level::Error, &format!("Failed {}", self.operation), fields);
        self.metrics
            .record_operation(&self.operation, Outcome::Error, duration_secs);
    }

    fn emit(&self, level: Level, message: &str, mut fields: Fields) {
        let mut merged = self.context.clone();
        merged.insert("operation".into(), field(&self.operation));
        merged.append(&mut fields);
        self.emitter.emit(level, message, merged, callsite!());
    }
}

/// Last segment of a Rust type path, mirroring an exception class name.
fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}

fn round_ms(duration_ms: f64) -> f64 {
    (duration_ms * 100.0).round() / 100.0
}
