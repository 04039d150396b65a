//! Core logger types and traits

pub mod appender;
pub mod async_appender;
pub mod config;
pub mod error;
pub mod extension;
pub mod log_level;
pub mod log_record;
pub mod logger;
pub mod memory;
pub mod metrics;
pub mod registry;
pub mod shutdown;
pub mod timers;
pub mod timestamp;

pub use appender::{shared, Appender, SharedAppender};
pub use async_appender::AsyncAppender;
pub use config::{DeliveryMode, LoggerConfig};
pub use error::{stderr_reporter, ErrorCallback, ErrorCategory, LoggerError, Result};
pub use extension::{CustomLevel, MessageFormatter};
pub use log_level::{should_deliver, LogLevel};
pub use log_record::{strip_ansi, LogRecord};
pub use logger::{Logger, LoggerBuilder, DEFAULT_SHUTDOWN_TIMEOUT};
pub use memory::{format_bytes, sample_process_memory, MemorySampler};
pub use metrics::LoggerMetrics;
pub use shutdown::{install_exit_handlers, ExitHandlerGuard};
pub use timers::{CallReport, Timers};
pub use timestamp::{parse_rotation_stamp, rotation_stamp, TimestampFormat};
