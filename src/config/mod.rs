//! Telemetry configuration.
//!
//! # Responsibilities
//! - Define the configuration schema (service identity, log level)
//! - Resolve settings from the environment once at process start
//! - Provide documented defaults for every setting

pub mod schema;

pub use schema::TelemetryConfig;
