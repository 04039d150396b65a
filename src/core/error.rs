//! Error types for the logger system

use std::sync::Arc;
use std::time::Duration;

pub type Result<T> = std::result::Result<T, LoggerError>;

/// Callback receiving every failure that is reported instead of returned.
///
/// File and channel failures never escape a log call; they are handed to
/// this callback at the boundary where they occur.
pub type ErrorCallback = Arc<dyn Fn(&LoggerError) + Send + Sync>;

/// Coarse classification of a [`LoggerError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// File open/append/rename/delete failures
    Io,
    /// Misuse of a feature gated behind configuration
    Configuration,
    /// Worker message passing or unexpected worker termination
    Channel,
    Other,
}

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    /// IO error with context
    #[error("IO error while {operation}: {message}")]
    IoOperation {
        operation: String,
        message: String,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON (configuration) error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Logger or sink already closed
    #[error("Logger already stopped")]
    LoggerStopped,

    /// Invalid configuration with details
    #[error("Invalid configuration for {component}: {message}")]
    InvalidConfiguration { component: String, message: String },

    /// File appender error with path
    #[error("File appender error for '{path}': {message}")]
    FileAppenderError { path: String, message: String },

    /// File rotation error
    #[error("File rotation failed for '{path}': {message}")]
    FileRotationError { path: String, message: String },

    /// Retention could not delete an old rotated file
    #[error("Failed to delete rotated log file '{path}': {message}")]
    RetentionError { path: String, message: String },

    /// Channel send error
    #[error("Failed to send log record to {target}")]
    ChannelSendError { target: String },

    /// Worker side went away before acknowledging close
    #[error("Log worker terminated unexpectedly: {message}")]
    WorkerTerminated { message: String },

    /// Shutdown gave up waiting for in-flight records
    #[error("Timed out after {timeout:?} waiting for {pending} in-flight log records")]
    DrainTimeout { pending: usize, timeout: Duration },

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl LoggerError {
    /// Create an IO operation error with context
    pub fn io_operation(
        operation: impl Into<String>,
        message: impl Into<String>,
        source: std::io::Error,
    ) -> Self {
        LoggerError::IoOperation {
            operation: operation.into(),
            message: message.into(),
            source,
        }
    }

    /// Create an invalid configuration error
    pub fn config(component: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::InvalidConfiguration {
            component: component.into(),
            message: message.into(),
        }
    }

    /// Create a file appender error
    pub fn file_appender(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileAppenderError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a file rotation error
    pub fn file_rotation(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::FileRotationError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a retention (old file deletion) error
    pub fn retention(path: impl Into<String>, message: impl Into<String>) -> Self {
        LoggerError::RetentionError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a channel send error naming the receiving side
    pub fn channel(target: impl Into<String>) -> Self {
        LoggerError::ChannelSendError {
            target: target.into(),
        }
    }

    pub fn worker_terminated(message: impl Into<String>) -> Self {
        LoggerError::WorkerTerminated {
            message: message.into(),
        }
    }

    pub fn drain_timeout(pending: usize, timeout: Duration) -> Self {
        LoggerError::DrainTimeout { pending, timeout }
    }

    /// Create a generic error
    pub fn other<S: Into<String>>(msg: S) -> Self {
        LoggerError::Other(msg.into())
    }

    /// Which failure class this error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            LoggerError::IoOperation { .. }
            | LoggerError::IoError(_)
            | LoggerError::FileAppenderError { .. }
            | LoggerError::FileRotationError { .. }
            | LoggerError::RetentionError { .. } => ErrorCategory::Io,
            LoggerError::InvalidConfiguration { .. } | LoggerError::JsonError(_) => {
                ErrorCategory::Configuration
            }
            LoggerError::ChannelSendError { .. }
            | LoggerError::WorkerTerminated { .. }
            | LoggerError::DrainTimeout { .. } => ErrorCategory::Channel,
            LoggerError::LoggerStopped | LoggerError::Other(_) => ErrorCategory::Other,
        }
    }
}

/// The default error sink: one bracketed line on stderr per failure
pub fn stderr_reporter() -> ErrorCallback {
    Arc::new(|err: &LoggerError| {
        eprintln!("[LOGGER ERROR] {}", err);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_error_creation() {
        let err = LoggerError::config("outputFilename", "Invalid path");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));

        let err = LoggerError::file_appender("/var/log/app.log", "Permission denied");
        assert!(matches!(err, LoggerError::FileAppenderError { .. }));

        let err = LoggerError::drain_timeout(3, Duration::from_millis(20));
        assert!(matches!(err, LoggerError::DrainTimeout { pending: 3, .. }));
    }

    #[test]
    fn test_error_display() {
        let err = LoggerError::file_rotation("/var/log/app.log", "Disk full");
        assert_eq!(
            err.to_string(),
            "File rotation failed for '/var/log/app.log': Disk full"
        );

        let err = LoggerError::channel("log worker");
        assert_eq!(err.to_string(), "Failed to send log record to log worker");

        let err = LoggerError::config("timers", "timers are disabled");
        assert_eq!(
            err.to_string(),
            "Invalid configuration for timers: timers are disabled"
        );
    }

    #[test]
    fn test_categories() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        assert_eq!(LoggerError::from(io_err).category(), ErrorCategory::Io);
        assert_eq!(
            LoggerError::retention("a.log", "busy").category(),
            ErrorCategory::Io
        );
        assert_eq!(
            LoggerError::config("mode", "bad").category(),
            ErrorCategory::Configuration
        );
        assert_eq!(
            LoggerError::worker_terminated("gone").category(),
            ErrorCategory::Channel
        );
        assert_eq!(LoggerError::LoggerStopped.category(), ErrorCategory::Other);
    }

    #[test]
    fn test_io_operation_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = LoggerError::io_operation("writing log file", "cannot write to file", io_err);

        assert!(matches!(err, LoggerError::IoOperation { .. }));
        assert!(err.to_string().contains("writing log file"));
        assert!(err.to_string().contains("cannot write to file"));
    }

    #[test]
    fn test_callback_receives_errors() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ErrorCallback = Arc::new(move |err| sink.lock().push(err.to_string()));

        callback(&LoggerError::LoggerStopped);
        assert_eq!(seen.lock().as_slice(), ["Logger already stopped"]);
    }
}
