//! Crate error type.
//!
//! Only setup-time operations are fallible: defining a metric series
//! (duplicate name, invalid labels) and encoding the exposition snapshot.
//! Hot-path instrumentation never returns errors; see the emitter and
//! middleware modules for the degradation rules.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Metric series definition, registration, or encoding failed.
    #[error("metrics error: {0}")]
    Metric(#[from] prometheus::Error),

    /// Unknown log level name in configuration.
    #[error("unknown log level: {0:?}")]
    InvalidLevel(String),
}

pub type Result<T> = std::result::Result<T, TelemetryError>;
