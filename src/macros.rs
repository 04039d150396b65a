//! Logging macros with `format!`-style arguments.
//!
//! Caller information points at the macro call site.
//!
//! # Examples
//!
//! ```
//! use rust_app_logger::prelude::*;
//! use rust_app_logger::info;
//!
//! let logger = Logger::builder().build().unwrap();
//!
//! info!(logger, "Server started");
//!
//! let port = 8080;
//! info!(logger, "Server listening on port {}", port);
//! ```

/// Log a message at `level` with automatic formatting.
///
/// # Examples
///
/// ```
/// # use rust_app_logger::prelude::*;
/// # let logger = Logger::builder().build().unwrap();
/// use rust_app_logger::log;
/// log!(logger, LogLevel::Info, "Simple message");
/// log!(logger, LogLevel::Error, "Error code: {}", 500);
/// ```
#[macro_export]
macro_rules! log {
    ($logger:expr, $level:expr, $($arg:tt)+) => {
        $logger.log($level, format!($($arg)+))
    };
}

/// Log only when the condition holds.
///
/// # Examples
///
/// ```
/// # use rust_app_logger::prelude::*;
/// # let logger = Logger::builder().build().unwrap();
/// use rust_app_logger::log_if;
/// let retries = 4;
/// log_if!(logger, LogLevel::Warn, retries > 3, "Retried {} times", retries);
/// ```
#[macro_export]
macro_rules! log_if {
    ($logger:expr, $level:expr, $cond:expr, $($arg:tt)+) => {
        $logger.log_if($level, $cond, format!($($arg)+))
    };
}

#[macro_export]
macro_rules! trace {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Trace, $($arg)+)
    };
}

#[macro_export]
macro_rules! debug {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Debug, $($arg)+)
    };
}

#[macro_export]
macro_rules! info {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Info, $($arg)+)
    };
}

#[macro_export]
macro_rules! warn {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Warn, $($arg)+)
    };
}

#[macro_export]
macro_rules! error {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Error, $($arg)+)
    };
}

/// Log a fatal-level message.
///
/// With `terminateOnFatal` set this closes the logger and exits.
#[macro_export]
macro_rules! fatal {
    ($logger:expr, $($arg:tt)+) => {
        $crate::log!($logger, $crate::LogLevel::Fatal, $($arg)+)
    };
}
