//! Logger configuration
//!
//! [`LoggerConfig`] mirrors the recognized option set and can be loaded from
//! JSON. Keys are camelCase (`outputFilename`, `maxLogFileSizeMB`, ...) and
//! every key is optional.

use super::error::{LoggerError, Result};
use super::log_level::LogLevel;
use super::timestamp::TimestampFormat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// How file-bound records travel from the logger to disk
///
/// Exactly one mode is active per logger and it never changes after
/// construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeliveryMode {
    /// Synchronous append on the calling thread
    #[default]
    #[serde(rename = "regular")]
    Immediate,
    /// Append handed to a writer thread; the caller never waits
    #[serde(rename = "async")]
    Deferred,
    /// Records accumulate and are flushed by size or by interval
    #[serde(rename = "async-queue")]
    BatchedQueue,
    /// Records are sent to an isolated worker owning its own file store
    #[serde(rename = "worker")]
    WorkerOffload,
}

impl DeliveryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMode::Immediate => "regular",
            DeliveryMode::Deferred => "async",
            DeliveryMode::BatchedQueue => "async-queue",
            DeliveryMode::WorkerOffload => "worker",
        }
    }
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeliveryMode {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "regular" => Ok(DeliveryMode::Immediate),
            "async" => Ok(DeliveryMode::Deferred),
            "async-queue" => Ok(DeliveryMode::BatchedQueue),
            "worker" => Ok(DeliveryMode::WorkerOffload),
            other => Err(LoggerError::config(
                "mode",
                format!("unknown delivery mode '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggerConfig {
    pub mode: DeliveryMode,
    /// Console threshold
    pub log_level: LogLevel,
    /// File threshold
    pub output_file_log_level: LogLevel,
    /// Absent disables file delivery entirely
    pub output_filename: Option<PathBuf>,
    #[serde(rename = "maxLogFileSizeMB")]
    pub max_log_file_size_mb: f64,
    pub max_log_files: usize,
    pub queue_batch_size: usize,
    /// Milliseconds between periodic batch flushes
    pub flush_interval: u64,
    pub worker_thread_name: String,
    /// Upper bound, in milliseconds, for every wait during shutdown
    pub drain_timeout: u64,

    pub enable_console: bool,
    pub use_colors: bool,
    pub include_timestamps: bool,
    pub timestamp_format: TimestampFormat,
    pub include_memory_usage: bool,
    /// Milliseconds between memory samples
    pub memory_sample_interval: u64,
    pub include_caller_info: bool,
    pub caller_info_level: LogLevel,
    pub include_inline_caller_info: bool,
    pub inline_caller_info_level: LogLevel,
    pub include_stack_trace: bool,
    pub write_session_header: bool,

    pub enable_timers: bool,
    pub generate_report: bool,
    pub terminate_on_fatal: bool,
    pub handle_exit_signals: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            mode: DeliveryMode::Immediate,
            log_level: LogLevel::Info,
            output_file_log_level: LogLevel::Trace,
            output_filename: None,
            max_log_file_size_mb: 10.0,
            max_log_files: 5,
            queue_batch_size: 100,
            flush_interval: 1000,
            worker_thread_name: "log-worker".to_string(),
            drain_timeout: 5000,
            enable_console: true,
            use_colors: true,
            include_timestamps: true,
            timestamp_format: TimestampFormat::default(),
            include_memory_usage: false,
            memory_sample_interval: 1000,
            include_caller_info: false,
            caller_info_level: LogLevel::Error,
            include_inline_caller_info: false,
            inline_caller_info_level: LogLevel::Trace,
            include_stack_trace: false,
            write_session_header: true,
            enable_timers: false,
            generate_report: false,
            terminate_on_fatal: false,
            handle_exit_signals: false,
        }
    }
}

impl LoggerConfig {
    /// Parse a JSON document; missing keys take their defaults
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_app_logger::core::{DeliveryMode, LoggerConfig};
    ///
    /// let config = LoggerConfig::from_json_str(r#"{ "mode": "async-queue", "queueBatchSize": 10 }"#).unwrap();
    /// assert_eq!(config.mode, DeliveryMode::BatchedQueue);
    /// assert_eq!(config.queue_batch_size, 10);
    /// ```
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: LoggerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            LoggerError::io_operation(
                "reading logger configuration",
                format!("cannot read '{}'", path.display()),
                e,
            )
        })?;
        Self::from_json_str(&text)
    }

    /// Reject settings no delivery path can work with
    pub fn validate(&self) -> Result<()> {
        if !self.max_log_file_size_mb.is_finite() || self.max_log_file_size_mb <= 0.0 {
            return Err(LoggerError::config(
                "maxLogFileSizeMB",
                format!("must be a positive number, got {}", self.max_log_file_size_mb),
            ));
        }
        if self.queue_batch_size == 0 {
            return Err(LoggerError::config("queueBatchSize", "must be at least 1"));
        }
        if self.flush_interval == 0 {
            return Err(LoggerError::config("flushInterval", "must be at least 1ms"));
        }
        if self.memory_sample_interval == 0 {
            return Err(LoggerError::config(
                "memorySampleInterval",
                "must be at least 1ms",
            ));
        }
        if self.mode == DeliveryMode::WorkerOffload && self.output_filename.is_none() {
            return Err(LoggerError::config(
                "mode",
                "worker mode requires outputFilename",
            ));
        }
        if self.worker_thread_name.is_empty() {
            return Err(LoggerError::config("workerThreadName", "must not be empty"));
        }
        self.timestamp_format
            .check()
            .map_err(|message| LoggerError::config("timestampFormat", message))?;
        Ok(())
    }

    /// Rotation threshold in bytes
    pub fn max_log_file_size_bytes(&self) -> u64 {
        (self.max_log_file_size_mb * 1024.0 * 1024.0).ceil() as u64
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval)
    }

    pub fn drain_timeout(&self) -> Duration {
        Duration::from_millis(self.drain_timeout)
    }

    pub fn memory_sample_interval(&self) -> Duration {
        Duration::from_millis(self.memory_sample_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = LoggerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mode, DeliveryMode::Immediate);
        assert_eq!(config.max_log_file_size_bytes(), 10 * 1024 * 1024);
    }

    #[test]
    fn test_mode_names() {
        for mode in [
            DeliveryMode::Immediate,
            DeliveryMode::Deferred,
            DeliveryMode::BatchedQueue,
            DeliveryMode::WorkerOffload,
        ] {
            assert_eq!(mode.as_str().parse::<DeliveryMode>().unwrap(), mode);
            let json = serde_json::to_string(&mode).unwrap();
            assert_eq!(json, format!("\"{}\"", mode));
        }
        assert!("turbo".parse::<DeliveryMode>().is_err());
    }

    #[test]
    fn test_from_json() {
        let config = LoggerConfig::from_json_str(
            r#"{
                "mode": "worker",
                "logLevel": 3,
                "outputFileLogLevel": 1,
                "outputFilename": "/tmp/app.log",
                "maxLogFileSizeMB": 0.5,
                "maxLogFiles": 3,
                "flushInterval": 250,
                "terminateOnFatal": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.mode, DeliveryMode::WorkerOffload);
        assert_eq!(config.log_level, LogLevel::Warn);
        assert_eq!(config.output_file_log_level, LogLevel::Debug);
        assert_eq!(config.output_filename, Some(PathBuf::from("/tmp/app.log")));
        assert_eq!(config.max_log_file_size_bytes(), 512 * 1024);
        assert_eq!(config.max_log_files, 3);
        assert_eq!(config.flush_interval(), Duration::from_millis(250));
        assert!(config.terminate_on_fatal);
        assert!(config.include_timestamps);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = LoggerConfig::from_json_str(r#"{ "logLevel": 9 }"#).unwrap_err();
        assert!(matches!(err, LoggerError::JsonError(_)));

        let err = LoggerConfig::from_json_str(r#"{ "queueBatchSize": 0 }"#).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));

        let err = LoggerConfig::from_json_str(r#"{ "maxLogFileSizeMB": -1 }"#).unwrap_err();
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));

        let err = LoggerConfig::from_json_str(r#"{ "mode": "worker" }"#).unwrap_err();
        assert!(err.to_string().contains("requires outputFilename"));

        let err =
            LoggerConfig::from_json_str(r#"{ "timestampFormat": { "custom": "%Q" } }"#).unwrap_err();
        assert!(err.to_string().contains("timestampFormat"));
    }

    #[test]
    fn test_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logger.json");
        std::fs::write(&path, r#"{ "mode": "async" }"#).unwrap();

        let config = LoggerConfig::from_json_file(&path).unwrap();
        assert_eq!(config.mode, DeliveryMode::Deferred);

        let missing = LoggerConfig::from_json_file(dir.path().join("nope.json"));
        assert!(matches!(missing, Err(LoggerError::IoOperation { .. })));
    }
}
