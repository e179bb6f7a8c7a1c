//! Configuration schema definitions.
//!
//! All settings are resolved from the environment once at process start.
//! The struct derives Serde traits so embedding applications that load a
//! config file can deserialize it directly instead.

use serde::{Deserialize, Serialize};
use std::env;

use crate::logging::emitter::{Level, LogFormat};

/// Telemetry settings shared by the emitter, middleware, and metric series.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Service name attached to every log record and metric
    /// (`SERVICE_NAME`, default `"service"`).
    pub service: String,

    /// Minimum log level (`LOG_LEVEL`, default `"INFO"`).
    pub log_level: String,

    /// Deployment environment label (`ENVIRONMENT`, default
    /// `"production"`). The value `"development"` switches the log output
    /// to the human-readable line format.
    pub environment: String,

    /// Service version attached to every log record (`APP_VERSION`,
    /// default `"1.0.0"`).
    pub version: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service: "service".to_string(),
            log_level: "INFO".to_string(),
            environment: "production".to_string(),
            version: "1.0.0".to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Resolve the configuration from the environment, falling back to the
    /// documented defaults for unset variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            service: env_or("SERVICE_NAME", defaults.service),
            log_level: env_or("LOG_LEVEL", defaults.log_level),
            environment: env_or("ENVIRONMENT", defaults.environment),
            version: env_or("APP_VERSION", defaults.version),
        }
    }

    /// Minimum level below which records are dropped. Unrecognized names
    /// fall back to `Info`.
    pub fn min_level(&self) -> Level {
        self.log_level.parse().unwrap_or(Level::Info)
    }

    /// Output format derived from the environment label.
    pub fn log_format(&self) -> LogFormat {
        if self.environment == "development" {
            LogFormat::Pretty
        } else {
            LogFormat::Json
        }
    }
}

fn env_or(name: &str, default: String) -> String {
    match env::var(name) {
        Ok(value) if !value.is_empty() => value,
        _ => default,
    }
}
