//! Structured log emitter.
//!
//! Every emitted record carries the reserved fields (timestamp, level,
//! service identity, source location, message, active trace ID) merged
//! with caller-supplied fields. Caller fields never clobber reserved keys;
//! on conflict they are renamed with an `extra_` prefix.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use crate::config::TelemetryConfig;
use crate::error::TelemetryError;
use crate::trace;

/// Severity of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warning,
    Error,
    Critical,
}

impl Level {
    pub fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Critical => "CRITICAL",
        }
    }

    /// Completion-record severity for an HTTP status code.
    pub fn for_status(status: u16) -> Self {
        match status {
            500.. => Level::Error,
            400.. => Level::Warning,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEBUG" => Ok(Level::Debug),
            "INFO" => Ok(Level::Info),
            "WARNING" | "WARN" => Ok(Level::Warning),
            "ERROR" => Ok(Level::Error),
            "CRITICAL" => Ok(Level::Critical),
            other => Err(TelemetryError::InvalidLevel(other.to_string())),
        }
    }
}

/// Output format, selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line (production).
    Json,
    /// `timestamp - logger - LEVEL - message` (development).
    Pretty,
}

/// Caller-supplied record fields, in insertion order.
pub type Fields = serde_json::Map<String, Value>;

/// Source location of a log call, captured by the logging macros.
#[derive(Debug, Clone, Copy)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
    pub function: &'static str,
}

/// Record keys the emitter owns. Caller fields under these names are
/// renamed, never merged.
const RESERVED_KEYS: &[&str] = &[
    "timestamp",
    "level",
    "service",
    "environment",
    "version",
    "logger",
    "file",
    "line",
    "function",
    "message",
    "trace_id",
];

/// Best-effort conversion of a value into a record field.
///
/// Falls back to the `Debug` rendering when serde serialization fails, so
/// a bad field degrades to a string instead of dropping the record.
pub fn field<T: serde::Serialize + fmt::Debug>(value: T) -> Value {
    serde_json::to_value(&value).unwrap_or_else(|_| Value::String(format!("{value:?}")))
}

/// Shared append-only log destination.
///
/// One record is exactly one line write under the internal lock, so
/// concurrent emitters never interleave partial lines.
#[derive(Clone)]
pub struct LogSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LogSink {
    /// Sink writing to process stdout.
    pub fn stdout() -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(io::stdout()))),
        }
    }

    /// In-memory sink with a capture handle, for tests and demos.
    pub fn memory() -> (Self, MemoryLogs) {
        let buffer: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Self {
            writer: Arc::new(Mutex::new(Box::new(MemoryWriter(buffer.clone())))),
        };
        (sink, MemoryLogs { buffer })
    }

    fn write_line(&self, line: &str) {
        if let Ok(mut writer) = self.writer.lock() {
            // A failed write is not recoverable from a log call.
            let _ = writeln!(writer, "{line}");
            let _ = writer.flush();
        }
    }
}

struct MemoryWriter(Arc<Mutex<Vec<u8>>>);

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Ok(mut inner) = self.0.lock() {
            inner.extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Capture handle for [`LogSink::memory`].
#[derive(Clone)]
pub struct MemoryLogs {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MemoryLogs {
    /// Captured output as one string.
    pub fn contents(&self) -> String {
        let inner = self.buffer.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&inner).into_owned()
    }

    /// Captured output split into lines.
    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    /// Captured JSON records, in emission order. Non-JSON lines are
    /// skipped.
    pub fn records(&self) -> Vec<Value> {
        self.lines()
            .iter()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect()
    }
}

struct ServiceIdentity {
    service: String,
    environment: String,
    version: String,
}

/// Structured log emitter bound to a logger name and a sink.
///
/// Cloning is cheap; clones share the sink. [`LogEmitter::child`] and
/// [`LogEmitter::with_context`] derive emitters for subsystems.
#[derive(Clone)]
pub struct LogEmitter {
    identity: Arc<ServiceIdentity>,
    logger: Arc<str>,
    context: Arc<Fields>,
    min_level: Level,
    format: LogFormat,
    sink: LogSink,
}

impl LogEmitter {
    /// Emitter writing to stdout, configured from `config`.
    pub fn new(config: &TelemetryConfig, logger: &str) -> Self {
        Self::with_sink(config, logger, LogSink::stdout())
    }

    /// Emitter writing to an explicit sink.
    pub fn with_sink(config: &TelemetryConfig, logger: &str, sink: LogSink) -> Self {
        Self {
            identity: Arc::new(ServiceIdentity {
                service: config.service.clone(),
                environment: config.environment.clone(),
                version: config.version.clone(),
            }),
            logger: Arc::from(logger),
            context: Arc::new(Fields::new()),
            min_level: config.min_level(),
            format: config.log_format(),
            sink,
        }
    }

    /// Derive an emitter with a different logger name, sharing everything
    /// else.
    pub fn child(&self, logger: &str) -> Self {
        Self {
            logger: Arc::from(logger),
            ..self.clone()
        }
    }

    /// Derive an emitter whose records always include `context` fields.
    pub fn with_context(&self, context: Fields) -> Self {
        let mut merged = (*self.context).clone();
        for (key, value) in context {
            merged.insert(key, value);
        }
        Self {
            context: Arc::new(merged),
            ..self.clone()
        }
    }

    pub fn logger(&self) -> &str {
        &self.logger
    }

    /// Whether records at `level` pass the configured minimum.
    pub fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    /// Emit one record. Never fails and never panics; see [`field`] for
    /// the degradation rule.
    pub fn emit(&self, level: Level, message: &str, fields: Fields, callsite: CallSite) {
        if !self.enabled(level) {
            return;
        }

        let line = match self.format {
            LogFormat::Pretty => self.render_pretty(level, message),
            LogFormat::Json => {
                let record = self.build_record(level, message, fields, callsite);
                match serde_json::to_string(&record) {
                    Ok(json) => json,
                    Err(_) => self.render_pretty(level, message),
                }
            }
        };
        self.sink.write_line(&line);
    }

    fn build_record(
        &self,
        level: Level,
        message: &str,
        fields: Fields,
        callsite: CallSite,
    ) -> Fields {
        let mut record = Fields::new();
        record.insert(
            "timestamp".into(),
            Value::String(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        record.insert("level".into(), Value::String(level.as_str().into()));
        record.insert("service".into(), Value::String(self.identity.service.clone()));
        record.insert(
            "environment".into(),
            Value::String(self.identity.environment.clone()),
        );
        record.insert("version".into(), Value::String(self.identity.version.clone()));
        record.insert("logger".into(), Value::String(self.logger.to_string()));
        record.insert("file".into(), Value::String(callsite.file.into()));
        record.insert("line".into(), Value::from(callsite.line));
        record.insert("function".into(), Value::String(callsite.function.into()));
        record.insert("message".into(), Value::String(message.into()));
        if let Some(trace_id) = trace::current() {
            record.insert("trace_id".into(), Value::String(trace_id.as_str().into()));
        }

        for (key, value) in self.context.iter() {
            insert_extra(&mut record, key.clone(), value.clone());
        }
        for (key, value) in fields {
            insert_extra(&mut record, key, value);
        }
        record
    }

    fn render_pretty(&self, level: Level, message: &str) -> String {
        format!(
            "{} - {} - {} - {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S"),
            self.logger,
            level,
            message
        )
    }
}

/// Insert a caller field, renaming it when it would clobber a reserved key
/// or a field already present.
fn insert_extra(record: &mut Fields, key: String, value: Value) {
    if RESERVED_KEYS.contains(&key.as_str()) || record.contains_key(&key) {
        record.insert(format!("extra_{key}"), value);
    } else {
        record.insert(key, value);
    }
}

/// Capture the source location of the current expression.
#[macro_export]
macro_rules! callsite {
    () => {{
        fn __here() {}
        fn __name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let __name = __name_of(__here);
        $crate::logging::emitter::CallSite {
            file: file!(),
            line: line!(),
            function: __name.strip_suffix("::__here").unwrap_or(__name),
        }
    }};
}

/// Emit a record at an explicit level, with optional fields:
/// `log_event!(emitter, Level::Info, "message", { "key" => value })`.
#[macro_export]
macro_rules! log_event {
    ($emitter:expr, $level:expr, $message:expr) => {
        $crate::log_event!($emitter, $level, $message, {})
    };
    ($emitter:expr, $level:expr, $message:expr, { $($key:literal => $value:expr),* $(,)? }) => {{
        let __emitter = &$emitter;
        let __level = $level;
        if __emitter.enabled(__level) {
            #[allow(unused_mut)]
            let mut __fields = $crate::logging::emitter::Fields::new();
            $(
                __fields.insert(($key).to_string(), $crate::logging::emitter::field(&$value));
            )*
            __emitter.emit(__level, $message, __fields, $crate::callsite!());
        }
    }};
}

#[macro_export]
macro_rules! log_debug {
    ($emitter:expr, $message:expr $(, $fields:tt)?) => {
        $crate::log_event!($emitter, $crate::logging::emitter::Level::Debug, $message $(, $fields)?)
    };
}

#[macro_export]
macro_rules! log_info {
    ($emitter:expr, $message:expr $(, $fields:tt)?) => {
        $crate::log_event!($emitter, $crate::logging::emitter::Level::Info, $message $(, $fields)?)
    };
}

#[macro_export]
macro_rules! log_warn {
    ($emitter:expr, $message:expr $(, $fields:tt)?) => {
        $crate::log_event!($emitter, $crate::logging::emitter::Level::Warning, $message $(, $fields)?)
    };
}

#[macro_export]
macro_rules! log_error {
    ($emitter:expr, $message:expr $(, $fields:tt)?) => {
        $crate::log_event!($emitter, $crate::logging::emitter::Level::Error, $message $(, $fields)?)
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;

    fn test_emitter() -> (LogEmitter, MemoryLogs) {
        let (sink, logs) = LogSink::memory();
        let config = TelemetryConfig {
            service: "test-service".into(),
            log_level: "DEBUG".into(),
            environment: "production".into(),
            version: "9.9.9".into(),
        };
        (LogEmitter::with_sink(&config, "test", sink), logs)
    }

    #[test]
    fn json_record_has_all_reserved_keys() {
        let (emitter, logs) = test_emitter();
        log_info!(emitter, "hello", { "user_id" => 7 });

        let records = logs.records();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        for key in [
            "timestamp",
            "level",
            "service",
            "environment",
            "version",
            "logger",
            "file",
            "line",
            "function",
            "message",
        ] {
            assert!(record.get(key).is_some(), "missing {key}");
        }
        assert_eq!(record["level"], "INFO");
        assert_eq!(record["service"], "test-service");
        assert_eq!(record["version"], "9.9.9");
        assert_eq!(record["message"], "hello");
        assert_eq!(record["user_id"], 7);
        // No trace scope active.
        assert!(record.get("trace_id").is_none());
    }

    #[test]
    fn caller_fields_cannot_clobber_reserved_keys() {
        let (emitter, logs) = test_emitter();
        log_info!(emitter, "real message", { "message" => "imposter", "service" => "imposter" });

        let record = &logs.records()[0];
        assert_eq!(record["message"], "real message");
        assert_eq!(record["service"], "test-service");
        assert_eq!(record["extra_message"], "imposter");
        assert_eq!(record["extra_service"], "imposter");
    }

    #[test]
    fn records_below_min_level_are_dropped() {
        let (sink, logs) = LogSink::memory();
        let config = TelemetryConfig {
            log_level: "WARNING".into(),
            ..Default::default()
        };
        let emitter = LogEmitter::with_sink(&config, "test", sink);

        log_event!(emitter, Level::Info, "dropped");
        log_event!(emitter, Level::Error, "kept");

        let records = logs.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["message"], "kept");
    }

    #[test]
    fn pretty_format_is_a_single_line() {
        let (sink, logs) = LogSink::memory();
        let config = TelemetryConfig {
            environment: "development".into(),
            ..Default::default()
        };
        let emitter = LogEmitter::with_sink(&config, "dev", sink);

        log_info!(emitter, "readable");

        let lines = logs.lines();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("- dev - INFO - readable"));
    }

    #[test]
    fn bound_context_appears_in_every_record() {
        let (emitter, logs) = test_emitter();
        let mut context = Fields::new();
        context.insert("request_kind".into(), field("api"));
        let scoped = emitter.with_context(context).child("api.users");

        log_info!(scoped, "one");
        log_info!(scoped, "two");

        let records = logs.records();
        assert_eq!(records.len(), 2);
        for record in &records {
            assert_eq!(record["request_kind"], "api");
            assert_eq!(record["logger"], "api.users");
        }
    }

    #[test]
    fn unserializable_field_degrades_to_string() {
        #[derive(Debug)]
        struct Opaque;
        impl serde::Serialize for Opaque {
            fn serialize<S: serde::Serializer>(&self, _: S) -> Result<S::Ok, S::Error> {
                Err(S::Error::custom("refuses to serialize"))
            }
        }

        let value = field(Opaque);
        assert_eq!(value, Value::String("Opaque".into()));
    }

    #[test]
    fn callsite_names_the_enclosing_function() {
        let site = callsite!();
        assert!(site.function.ends_with("callsite_names_the_enclosing_function"));
        assert!(site.file.ends_with("emitter.rs"));
    }

    #[tokio::test]
    async fn trace_id_is_attached_inside_a_scope() {
        let (emitter, logs) = test_emitter();
        let id = crate::trace::TraceId::assign(Some("trace-xyz"));
        crate::trace::scope(id, async {
            log_info!(emitter, "traced");
        })
        .await;

        assert_eq!(logs.records()[0]["trace_id"], "trace-xyz");
    }
}
