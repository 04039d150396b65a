//! # Rust App Logger
//!
//! A leveled application logger with console output and a rotating log
//! file, fed through one of four delivery modes.
//!
//! ## Features
//!
//! - **Delivery modes**: immediate, deferred writer thread, batched queue,
//!   or an isolated worker that owns its own file
//! - **Rotation**: size-based rotation with a bounded number of kept files
//! - **Clean shutdown**: `close()` drains every accepted record, bounded by
//!   a timeout
//! - **Enrichment**: timestamps, caller location, memory usage, stack traces,
//!   timers and custom levels

pub mod appenders;
pub mod core;
pub mod macros;

pub mod prelude {
    pub use crate::appenders::{RotatingFileStore, StoreOptions};
    pub use crate::core::{
        Appender, CustomLevel, DeliveryMode, ErrorCallback, LogLevel, LogRecord, Logger,
        LoggerBuilder, LoggerConfig, LoggerError, LoggerMetrics, Result, TimestampFormat,
        DEFAULT_SHUTDOWN_TIMEOUT,
    };
}

pub use appenders::{RotatingFileStore, StoreOptions};
pub use core::{
    Appender, CustomLevel, DeliveryMode, ErrorCallback, ErrorCategory, LogLevel, LogRecord, Logger,
    LoggerBuilder, LoggerConfig, LoggerError, LoggerMetrics, Result, TimestampFormat,
    DEFAULT_SHUTDOWN_TIMEOUT,
};
