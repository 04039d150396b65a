//! Main logger implementation

use super::{
    config::{DeliveryMode, LoggerConfig},
    error::{stderr_reporter, ErrorCallback, LoggerError, Result},
    extension::CustomLevel,
    log_level::{should_deliver, LogLevel},
    log_record::LogRecord,
    memory::MemorySampler,
    metrics::LoggerMetrics,
    shutdown::{install_exit_handlers, ExitHandlerGuard},
    timers::{CallReport, Timers},
    appender::{shared, Appender, SharedAppender},
};
use crate::appenders::{
    ConsoleSink, DeliveryHandler, HandlerOptions, RotatingFileStore, StoreOptions, WorkerChannel,
    WorkerEntry, WorkerOptions,
};
use parking_lot::{Condvar, Mutex};
use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::io::Write;
use std::panic::Location;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default bound for every shutdown wait (5 seconds)
///
/// Used when a component is dropped without an explicit `close()`; the
/// logger itself takes the bound from `drainTimeout`.
pub const DEFAULT_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

enum FileDelivery {
    Handler {
        handler: DeliveryHandler,
        store: SharedAppender,
    },
    Worker(WorkerChannel),
}

/// Leveled logger with console output and one file delivery path
///
/// # Example
///
/// ```
/// use rust_app_logger::prelude::*;
///
/// let dir = tempfile::tempdir().unwrap();
/// let logger = Logger::builder()
///     .mode(DeliveryMode::BatchedQueue)
///     .output_file(dir.path().join("app.log"))
///     .build()
///     .unwrap();
///
/// logger.info("service started");
/// logger.close().unwrap();
/// ```
pub struct Logger {
    config: LoggerConfig,
    console: Option<ConsoleSink>,
    file: Option<FileDelivery>,
    memory: Option<MemorySampler>,
    timers: Timers,
    report: CallReport,
    custom_levels: HashMap<String, CustomLevel>,
    /// Metrics for observability (written, failed, rotated, ...)
    metrics: Arc<LoggerMetrics>,
    on_error: ErrorCallback,
    exit_guard: Mutex<Option<ExitHandlerGuard>>,
    closing: AtomicBool,
    closed: Mutex<bool>,
    closed_changed: Condvar,
}

impl Logger {
    /// Build a logger straight from a configuration
    pub fn from_config(config: LoggerConfig) -> Result<Self> {
        LoggerBuilder::new().config(config).build()
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        self.dispatch(level, None, message.as_ref(), None, Location::caller());
    }

    /// Log only when `condition` holds
    #[track_caller]
    pub fn log_if(&self, level: LogLevel, condition: bool, message: impl AsRef<str>) {
        self.dispatch(level, None, message.as_ref(), Some(condition), Location::caller());
    }

    #[track_caller]
    pub fn trace(&self, message: impl AsRef<str>) {
        self.dispatch(LogLevel::Trace, None, message.as_ref(), None, Location::caller());
    }

    #[track_caller]
    pub fn debug(&self, message: impl AsRef<str>) {
        self.dispatch(LogLevel::Debug, None, message.as_ref(), None, Location::caller());
    }

    #[track_caller]
    pub fn info(&self, message: impl AsRef<str>) {
        self.dispatch(LogLevel::Info, None, message.as_ref(), None, Location::caller());
    }

    #[track_caller]
    pub fn warn(&self, message: impl AsRef<str>) {
        self.dispatch(LogLevel::Warn, None, message.as_ref(), None, Location::caller());
    }

    #[track_caller]
    pub fn error(&self, message: impl AsRef<str>) {
        self.dispatch(LogLevel::Error, None, message.as_ref(), None, Location::caller());
    }

    #[track_caller]
    pub fn fatal(&self, message: impl AsRef<str>) {
        self.dispatch(LogLevel::Fatal, None, message.as_ref(), None, Location::caller());
    }

    /// Log at a custom level registered on the builder
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` if no level named `name` was registered.
    #[track_caller]
    pub fn log_custom(&self, name: &str, message: impl AsRef<str>) -> Result<()> {
        let custom = self.custom_levels.get(name).ok_or_else(|| {
            LoggerError::config("customLevel", format!("unknown custom level '{}'", name))
        })?;
        self.dispatch(
            custom.level(),
            Some(custom),
            message.as_ref(),
            None,
            Location::caller(),
        );
        Ok(())
    }

    fn dispatch(
        &self,
        level: LogLevel,
        custom: Option<&CustomLevel>,
        message: &str,
        condition: Option<bool>,
        location: &'static Location<'static>,
    ) {
        let to_console =
            self.console.is_some() && should_deliver(level, self.config.log_level, condition);
        let to_file = self.file.is_some()
            && should_deliver(level, self.config.output_file_log_level, condition);
        if !to_console && !to_file {
            return;
        }

        let record = self.build_record(level, custom, message, location);

        if let (true, Some(console)) = (to_console, self.console.as_ref()) {
            if let Err(e) = console.write_record(&record) {
                (self.on_error)(&e);
            }
        }

        if let (true, Some(file)) = (to_file, self.file.as_ref()) {
            let plain = record.render_plain();
            match file {
                FileDelivery::Handler { handler, .. } => {
                    handler.log(&plain);
                }
                FileDelivery::Worker(channel) => {
                    channel.log_to_worker(plain);
                }
            }
        }

        if self.config.generate_report {
            self.report.record(&record.label);
        }

        if level == LogLevel::Fatal && self.config.terminate_on_fatal {
            // close() already reported every failure
            let _ = self.close();
            // another thread may own the shutdown; let it finish draining
            self.wait_until_closed(self.config.drain_timeout() * 4);
            std::process::exit(1);
        }
    }

    fn build_record(
        &self,
        level: LogLevel,
        custom: Option<&CustomLevel>,
        message: &str,
        location: &'static Location<'static>,
    ) -> LogRecord {
        let config = &self.config;
        let mut record = match custom {
            Some(custom) => LogRecord::new(level, custom.format_message(message))
                .with_label(custom.label(), custom.color()),
            None => LogRecord::new(level, message),
        };

        if config.include_timestamps {
            record = record.with_timestamp(config.timestamp_format.now());
        }
        if config.include_memory_usage {
            if let Some(memory) = self.memory.as_ref().and_then(MemorySampler::latest_formatted) {
                record = record.with_memory_usage(memory);
            }
        }
        if config.include_inline_caller_info && level >= config.inline_caller_info_level {
            record = record.with_inline_caller(location);
        }
        if config.include_caller_info && level >= config.caller_info_level {
            record = record.with_caller(location);
        }
        if config.include_stack_trace && level >= LogLevel::Error {
            record = record.with_stack_trace(Backtrace::force_capture().to_string());
        }

        record
    }

    /// Start the timer named `label`
    ///
    /// # Errors
    ///
    /// `InvalidConfiguration` when timers are disabled.
    pub fn time(&self, label: &str) -> Result<()> {
        self.require(self.config.enable_timers, "enableTimers", "timers are disabled")?;
        self.timers.start(label);
        Ok(())
    }

    /// Stop the timer and log `"{label}: {ms}ms"` at info level
    #[track_caller]
    pub fn time_end(&self, label: &str) -> Result<Duration> {
        self.require(self.config.enable_timers, "enableTimers", "timers are disabled")?;
        let elapsed = self.timers.end(label).ok_or_else(|| {
            LoggerError::config("timers", format!("no running timer named '{}'", label))
        })?;

        let message = format!("{}: {:.3}ms", label, elapsed.as_secs_f64() * 1000.0);
        self.dispatch(LogLevel::Info, None, &message, None, Location::caller());
        Ok(elapsed)
    }

    /// Per-level count of delivered calls
    pub fn report(&self) -> Result<String> {
        self.require(self.config.generate_report, "generateReport", "reporting is disabled")?;
        Ok(self.report.render())
    }

    fn require(&self, enabled: bool, component: &str, message: &str) -> Result<()> {
        if enabled {
            Ok(())
        } else {
            Err(LoggerError::config(component, message))
        }
    }

    /// Block until every record accepted so far has reached its file
    pub fn flush(&self) -> Result<()> {
        if let Some(ref console) = self.console {
            console.flush()?;
        }
        match self.file {
            Some(FileDelivery::Handler { ref handler, .. }) => handler.flush(),
            Some(FileDelivery::Worker(ref channel)) => channel.wait_for_drain(),
            None => Ok(()),
        }
    }

    /// Shut down every delivery path, in order
    ///
    /// Memory sampling stops, the handler queue is flushed and the handler
    /// closed, then the file store, then the worker channel. A failing step
    /// is reported and the remaining steps still run; the first failure is
    /// returned. Calling `close` again, even concurrently, is a no-op.
    pub fn close(&self) -> Result<()> {
        if self.closing.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut first_error = None;

        if let Some(ref memory) = self.memory {
            memory.stop();
        }

        match self.file {
            Some(FileDelivery::Handler {
                ref handler,
                ref store,
            }) => {
                self.settle(handler.flush(), &mut first_error);
                self.settle(handler.close(), &mut first_error);
                self.settle(store.lock().close(), &mut first_error);
            }
            Some(FileDelivery::Worker(ref channel)) => {
                self.settle(channel.close_worker(), &mut first_error);
            }
            None => {}
        }

        if self.config.generate_report {
            if let Some(ref console) = self.console {
                self.settle(console.write_text(&self.report.render()), &mut first_error);
            }
        }
        if let Some(ref console) = self.console {
            self.settle(console.flush(), &mut first_error);
        }

        if let Some(guard) = self.exit_guard.lock().take() {
            guard.uninstall();
        }

        *self.closed.lock() = true;
        self.closed_changed.notify_all();
        first_error.map_or(Ok(()), Err)
    }

    /// Block until a shutdown started by any thread has completed
    ///
    /// Returns whether the logger is closed; `false` means `timeout` ran
    /// out first or nobody called `close()`.
    pub fn wait_until_closed(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut closed = self.closed.lock();
        while !*closed {
            if self.closed_changed.wait_until(&mut closed, deadline).timed_out() {
                break;
            }
        }
        *closed
    }

    fn settle(&self, outcome: Result<()>, first_error: &mut Option<LoggerError>) {
        if let Err(e) = outcome {
            (self.on_error)(&e);
            first_error.get_or_insert(e);
        }
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn delivery_mode(&self) -> DeliveryMode {
        self.config.mode
    }

    /// Whether records have a file to go to
    pub fn has_file_output(&self) -> bool {
        self.file.is_some()
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.config.output_filename.as_deref()
    }

    /// Records accepted for the file but not yet written
    pub fn pending_records(&self) -> usize {
        match self.file {
            Some(FileDelivery::Handler { ref handler, .. }) => handler.pending_len(),
            Some(FileDelivery::Worker(ref channel)) => channel.pending_messages(),
            None => 0,
        }
    }

    /// Get metrics for observability
    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    /// Create a builder for Logger
    #[must_use]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder::new()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if !self.is_closing() {
            // failures were already handed to the error callback
            let _ = self.close();
        }

        let failed = self.metrics.write_failures();
        if failed > 0 {
            eprintln!(
                "[LOGGER WARNING] Logger shut down with {} lost file records (failure rate: {:.2}%)",
                failed,
                self.metrics.failure_rate()
            );
        }
    }
}

/// Builder for constructing Logger with a fluent API
///
/// # Example
/// ```
/// use rust_app_logger::prelude::*;
/// use std::sync::Arc;
///
/// let logger = Logger::builder()
///     .log_level(LogLevel::Debug)
///     .custom_level(CustomLevel::new("audit", LogLevel::Warn))
///     .on_error(Arc::new(|err| eprintln!("logging problem: {}", err)))
///     .build()
///     .unwrap();
///
/// logger.log_custom("audit", "config reloaded").unwrap();
/// ```
pub struct LoggerBuilder {
    config: LoggerConfig,
    on_error: Option<ErrorCallback>,
    console_writer: Option<Box<dyn Write + Send>>,
    file_appender: Option<SharedAppender>,
    custom_levels: Vec<CustomLevel>,
    worker_entry: Option<WorkerEntry>,
}

impl LoggerBuilder {
    pub fn new() -> Self {
        Self {
            config: LoggerConfig::default(),
            on_error: None,
            console_writer: None,
            file_appender: None,
            custom_levels: Vec::new(),
            worker_entry: None,
        }
    }

    /// Replace the whole configuration
    #[must_use = "builder methods return a new value"]
    pub fn config(mut self, config: LoggerConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn mode(mut self, mode: DeliveryMode) -> Self {
        self.config.mode = mode;
        self
    }

    /// Console threshold
    #[must_use = "builder methods return a new value"]
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.log_level = level;
        self
    }

    /// File threshold
    #[must_use = "builder methods return a new value"]
    pub fn file_log_level(mut self, level: LogLevel) -> Self {
        self.config.output_file_log_level = level;
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn output_file(mut self, path: impl AsRef<Path>) -> Self {
        self.config.output_filename = Some(path.as_ref().to_path_buf());
        self
    }

    /// Sink for failures that are reported rather than returned
    ///
    /// Defaults to one `[LOGGER ERROR]` line on stderr per failure.
    #[must_use = "builder methods return a new value"]
    pub fn on_error(mut self, callback: ErrorCallback) -> Self {
        self.on_error = Some(callback);
        self
    }

    /// Write console output to `writer` instead of stdout/stderr
    #[must_use = "builder methods return a new value"]
    pub fn console_writer(mut self, writer: Box<dyn Write + Send>) -> Self {
        self.console_writer = Some(writer);
        self
    }

    /// Use `appender` instead of opening `outputFilename`
    ///
    /// Ignored in worker mode, where the worker owns its store.
    #[must_use = "builder methods return a new value"]
    pub fn file_appender<A: Appender + 'static>(mut self, appender: A) -> Self {
        self.file_appender = Some(shared(appender));
        self
    }

    #[must_use = "builder methods return a new value"]
    pub fn custom_level(mut self, level: CustomLevel) -> Self {
        self.custom_levels.push(level);
        self
    }

    /// Replace the body of the worker thread in worker mode
    #[must_use = "builder methods return a new value"]
    pub fn worker_entry(mut self, entry: WorkerEntry) -> Self {
        self.worker_entry = Some(entry);
        self
    }

    /// Build the Logger
    ///
    /// # Errors
    ///
    /// Invalid configuration is returned. A file that cannot be opened is
    /// reported and the logger falls back to console output.
    pub fn build(self) -> Result<Logger> {
        let config = self.config;
        config.validate()?;

        let metrics = Arc::new(LoggerMetrics::new());
        let on_error = self.on_error.unwrap_or_else(stderr_reporter);

        let console = config.enable_console.then(|| match self.console_writer {
            Some(writer) => ConsoleSink::with_writer(config.use_colors, writer),
            None => ConsoleSink::new(config.use_colors),
        });

        let store_options = StoreOptions::new()
            .with_max_size(config.max_log_file_size_bytes())
            .with_max_retained(config.max_log_files)
            .with_header(config.write_session_header);

        let file = match config.mode {
            DeliveryMode::WorkerOffload => {
                let path = config.output_filename.clone().ok_or_else(|| {
                    LoggerError::config("mode", "worker mode requires outputFilename")
                })?;
                let mut options = WorkerOptions::new(path)
                    .with_store_options(store_options)
                    .with_thread_name(config.worker_thread_name.clone())
                    .with_drain_timeout(config.drain_timeout());
                if let Some(entry) = self.worker_entry {
                    options = options.with_entry(entry);
                }

                let channel = WorkerChannel::new(options, Arc::clone(&metrics), Arc::clone(&on_error));
                // a failed start is retried on first use
                if let Err(e) = channel.start() {
                    on_error(&e);
                }
                Some(FileDelivery::Worker(channel))
            }
            mode => {
                let store = match (self.file_appender, config.output_filename.as_ref()) {
                    (Some(appender), _) => Some(appender),
                    (None, Some(path)) => match RotatingFileStore::open_with(
                        path,
                        store_options,
                        Arc::clone(&metrics),
                        Arc::clone(&on_error),
                    ) {
                        Ok(store) => Some(shared(store)),
                        Err(e) => {
                            on_error(&e);
                            None
                        }
                    },
                    (None, None) => None,
                };

                match store {
                    Some(store) => Some(FileDelivery::Handler {
                        handler: DeliveryHandler::new(
                            mode,
                            Arc::clone(&store),
                            HandlerOptions::from_config(&config),
                            Arc::clone(&metrics),
                            Arc::clone(&on_error),
                        )?,
                        store,
                    }),
                    None => None,
                }
            }
        };

        let memory = if config.include_memory_usage {
            match MemorySampler::start(config.memory_sample_interval()) {
                Ok(sampler) => Some(sampler),
                Err(e) => {
                    on_error(&e);
                    None
                }
            }
        } else {
            None
        };

        let custom_levels = self
            .custom_levels
            .into_iter()
            .map(|level| (level.name().to_string(), level))
            .collect();

        Ok(Logger {
            config,
            console,
            file,
            memory,
            timers: Timers::new(),
            report: CallReport::new(),
            custom_levels,
            metrics,
            on_error,
            exit_guard: Mutex::new(None),
            closing: AtomicBool::new(false),
            closed: Mutex::new(false),
            closed_changed: Condvar::new(),
        })
    }

    /// Build a shared logger, installing exit-signal handlers if configured
    pub fn build_shared(self) -> Result<Arc<Logger>> {
        let logger = Arc::new(self.build()?);

        if logger.config.handle_exit_signals {
            match install_exit_handlers(Arc::downgrade(&logger)) {
                Ok(guard) => *logger.exit_guard.lock() = Some(guard),
                Err(e) => (logger.on_error)(&e),
            }
        }

        Ok(logger)
    }
}

impl Default for LoggerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().clone()).unwrap()
        }
    }

    fn quiet_config() -> LoggerConfig {
        LoggerConfig {
            include_timestamps: false,
            use_colors: false,
            write_session_header: false,
            ..LoggerConfig::default()
        }
    }

    #[test]
    fn test_builder_basic() {
        let logger = Logger::builder()
            .log_level(LogLevel::Debug)
            .config(LoggerConfig {
                enable_console: false,
                ..LoggerConfig::default()
            })
            .build()
            .unwrap();

        assert_eq!(logger.delivery_mode(), DeliveryMode::Immediate);
        assert!(!logger.has_file_output());
        assert_eq!(logger.metrics().records_written(), 0);
    }

    #[test]
    fn test_console_threshold() {
        let out = Captured::default();
        let logger = Logger::builder()
            .config(quiet_config())
            .log_level(LogLevel::Warn)
            .console_writer(Box::new(out.clone()))
            .build()
            .unwrap();

        logger.info("hidden");
        logger.warn("shown");
        logger.log_if(LogLevel::Error, false, "suppressed");
        logger.log_if(LogLevel::Error, true, "kept");

        assert_eq!(out.text(), "[WARN ] shown\n[ERROR] kept\n");
    }

    #[test]
    fn test_independent_file_threshold() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("levels.log");
        let out = Captured::default();
        let logger = Logger::builder()
            .config(quiet_config())
            .log_level(LogLevel::Error)
            .file_log_level(LogLevel::Debug)
            .output_file(&path)
            .console_writer(Box::new(out.clone()))
            .build()
            .unwrap();

        logger.trace("nowhere");
        logger.debug("file only");
        logger.error("both");
        logger.close().unwrap();

        assert_eq!(out.text(), "[ERROR] both\n");
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "[DEBUG] file only\n[ERROR] both\n"
        );
    }

    #[test]
    fn test_timers_require_configuration() {
        let logger = Logger::from_config(LoggerConfig {
            enable_console: false,
            ..quiet_config()
        })
        .unwrap();

        assert!(matches!(
            logger.time("load"),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
        assert!(logger.time_end("load").is_err());
        assert!(logger.report().is_err());
    }

    #[test]
    fn test_timer_logs_elapsed() {
        let out = Captured::default();
        let logger = Logger::builder()
            .config(LoggerConfig {
                enable_timers: true,
                ..quiet_config()
            })
            .console_writer(Box::new(out.clone()))
            .build()
            .unwrap();

        logger.time("load").unwrap();
        let elapsed = logger.time_end("load").unwrap();
        assert!(elapsed < Duration::from_secs(5));
        assert!(out.text().starts_with("[INFO ] load: "));
        assert!(out.text().trim_end().ends_with("ms"));
        assert!(logger.time_end("load").is_err());
    }

    #[test]
    fn test_custom_level() {
        let out = Captured::default();
        let logger = Logger::builder()
            .config(quiet_config())
            .console_writer(Box::new(out.clone()))
            .custom_level(
                CustomLevel::new("audit", LogLevel::Warn).with_formatter(|m| format!("<{}>", m)),
            )
            .build()
            .unwrap();

        logger.log_custom("audit", "role changed").unwrap();
        assert!(matches!(
            logger.log_custom("nope", "x"),
            Err(LoggerError::InvalidConfiguration { .. })
        ));
        assert_eq!(out.text(), "[AUDIT] <role changed>\n");
    }

    #[test]
    fn test_inline_caller_info() {
        let out = Captured::default();
        let logger = Logger::builder()
            .config(LoggerConfig {
                include_inline_caller_info: true,
                include_caller_info: true,
                ..quiet_config()
            })
            .console_writer(Box::new(out.clone()))
            .build()
            .unwrap();

        logger.info("here");
        logger.error("there");

        let text = out.text();
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with("[INFO ] [logger.rs:"));
        assert!(!lines[0].contains("(at "));
        assert!(lines[1].contains("(at src/core/logger.rs:"));
    }

    #[test]
    fn test_report_counts_delivered_calls() {
        let out = Captured::default();
        let logger = Logger::builder()
            .config(LoggerConfig {
                generate_report: true,
                ..quiet_config()
            })
            .console_writer(Box::new(out.clone()))
            .build()
            .unwrap();

        logger.info("a");
        logger.info("b");
        logger.debug("filtered");
        logger.error("c");

        assert_eq!(
            logger.report().unwrap(),
            "=== log call report ===\nERROR: 1\nINFO: 2\ntotal: 3"
        );
        logger.close().unwrap();
        assert!(out.text().ends_with("total: 3\n"));
    }

    #[test]
    fn test_close_is_idempotent() {
        let dir = tempdir().unwrap();
        let logger = Logger::builder()
            .config(LoggerConfig {
                enable_console: false,
                ..quiet_config()
            })
            .mode(DeliveryMode::Deferred)
            .output_file(dir.path().join("close.log"))
            .build()
            .unwrap();

        logger.info("one");
        assert!(logger.close().is_ok());
        assert!(logger.close().is_ok());
        assert!(logger.is_closing());
        assert!(logger.is_closed());

        logger.info("after close");
        assert_eq!(logger.metrics().rejected(), 1);
        assert_eq!(
            fs::read_to_string(dir.path().join("close.log")).unwrap(),
            "[INFO ] one\n"
        );
    }

    #[test]
    fn test_unopenable_file_degrades_to_console() {
        let dir = tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "file").unwrap();

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let out = Captured::default();
        let logger = Logger::builder()
            .config(quiet_config())
            .output_file(blocker.join("app.log"))
            .console_writer(Box::new(out.clone()))
            .on_error(Arc::new(move |e: &LoggerError| sink.lock().push(e.category())))
            .build()
            .unwrap();

        logger.info("still visible");
        assert!(!logger.has_file_output());
        assert_eq!(out.text(), "[INFO ] still visible\n");
        assert_eq!(errors.lock().len(), 1);
    }

    #[test]
    fn test_second_closer_can_wait_for_the_first() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("shared-close.log");
        let logger = Arc::new(
            Logger::builder()
                .config(LoggerConfig {
                    enable_console: false,
                    ..quiet_config()
                })
                .mode(DeliveryMode::WorkerOffload)
                .output_file(&path)
                .build()
                .unwrap(),
        );
        assert!(!logger.wait_until_closed(Duration::from_millis(10)));

        for i in 0..2000 {
            logger.info(format!("record {}", i));
        }

        let closer = {
            let logger = Arc::clone(&logger);
            std::thread::spawn(move || logger.close())
        };
        // either this call or the thread owns the shutdown
        logger.close().unwrap();
        assert!(logger.wait_until_closed(Duration::from_secs(20)));
        assert_eq!(fs::read_to_string(&path).unwrap().lines().count(), 2000);

        closer.join().unwrap().unwrap();
    }

    #[test]
    fn test_bad_timestamp_pattern_rejected_at_build() {
        let result = Logger::builder()
            .config(LoggerConfig {
                timestamp_format: crate::core::TimestampFormat::Custom("%Q".to_string()),
                ..quiet_config()
            })
            .build();
        assert!(matches!(result, Err(LoggerError::InvalidConfiguration { .. })));
    }
}
