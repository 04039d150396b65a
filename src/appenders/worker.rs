//! Worker offload channel
//!
//! File writes run on an isolated worker thread that owns its own
//! [`RotatingFileStore`]. The channel counts records in flight so shutdown
//! can wait for every one of them before asking the worker to close.
//!
//! Protocol, in both directions one message at a time:
//!
//! - to the worker: a record payload, or the `close` token
//! - from the worker: `processed` after each record, `closed` after close
//!
//! In-process the messages travel as [`WorkerCommand`] and [`WorkerSignal`],
//! so a record whose text happens to be `close` is never taken for the token.

use super::join_with_timeout;
use super::rotating_file::{RotatingFileStore, StoreOptions};
use crate::core::{ErrorCallback, LoggerError, LoggerMetrics, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Condvar, Mutex};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

const CLOSE_TOKEN: &str = "close";
const PROCESSED_TOKEN: &str = "processed";
const CLOSED_TOKEN: &str = "closed";

/// Message from the logger to the worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerCommand {
    Log(String),
    Close,
}

impl WorkerCommand {
    pub fn to_wire(&self) -> &str {
        match self {
            WorkerCommand::Log(payload) => payload,
            WorkerCommand::Close => CLOSE_TOKEN,
        }
    }

    pub fn from_wire(text: &str) -> Self {
        if text == CLOSE_TOKEN {
            WorkerCommand::Close
        } else {
            WorkerCommand::Log(text.to_string())
        }
    }
}

/// Message from the worker back to the logger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerSignal {
    /// One record has been handled (written or failed)
    Processed,
    /// The worker closed its store and is about to exit
    Closed,
}

impl WorkerSignal {
    pub fn to_wire(&self) -> &'static str {
        match self {
            WorkerSignal::Processed => PROCESSED_TOKEN,
            WorkerSignal::Closed => CLOSED_TOKEN,
        }
    }

    pub fn from_wire(text: &str) -> Option<Self> {
        match text {
            PROCESSED_TOKEN => Some(WorkerSignal::Processed),
            CLOSED_TOKEN => Some(WorkerSignal::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for WorkerSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_wire())
    }
}

impl FromStr for WorkerSignal {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_wire(s)
            .ok_or_else(|| LoggerError::other(format!("unknown worker signal '{}'", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelState {
    Uninitialized,
    Running,
    /// Shutdown started; new records are refused
    Closing,
    Closed,
}

/// The worker's side of the channel, handed to the worker entry
pub struct WorkerEndpoint {
    commands: Receiver<WorkerCommand>,
    signals: Sender<WorkerSignal>,
    path: PathBuf,
    store_options: StoreOptions,
    metrics: Arc<LoggerMetrics>,
    on_error: ErrorCallback,
}

impl WorkerEndpoint {
    /// Next command; `None` once the logger side has disconnected
    pub fn recv(&self) -> Option<WorkerCommand> {
        self.commands.recv().ok()
    }

    pub fn signal(&self, signal: WorkerSignal) -> bool {
        self.signals.send(signal).is_ok()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn store_options(&self) -> &StoreOptions {
        &self.store_options
    }

    pub fn metrics(&self) -> &Arc<LoggerMetrics> {
        &self.metrics
    }

    pub fn report(&self, err: &LoggerError) {
        (self.on_error)(err);
    }
}

/// Body of the worker thread
pub type WorkerEntry = Arc<dyn Fn(WorkerEndpoint) + Send + Sync>;

/// Default worker: append each record to its own rotating store
pub fn run_file_worker(endpoint: WorkerEndpoint) {
    let mut store = match RotatingFileStore::open_with(
        endpoint.path(),
        endpoint.store_options().clone(),
        Arc::clone(endpoint.metrics()),
        Arc::clone(&endpoint.on_error),
    ) {
        Ok(store) => Some(store),
        Err(e) => {
            endpoint.report(&e);
            None
        }
    };

    while let Some(command) = endpoint.recv() {
        match command {
            WorkerCommand::Log(payload) => {
                let mut bytes = payload.into_bytes();
                bytes.push(b'\n');
                let written = match store.as_mut() {
                    Some(store) => store.append(&bytes),
                    None => Err(LoggerError::file_appender(
                        endpoint.path().display().to_string(),
                        "worker store is not open",
                    )),
                };
                match written {
                    Ok(()) => endpoint.metrics().record_written(1),
                    Err(e) => {
                        endpoint.metrics().record_write_failure(1);
                        endpoint.report(&e);
                    }
                }
                endpoint.signal(WorkerSignal::Processed);
            }
            WorkerCommand::Close => {
                if let Some(mut store) = store.take() {
                    if let Err(e) = store.close() {
                        endpoint.report(&e);
                    }
                }
                endpoint.signal(WorkerSignal::Closed);
                return;
            }
        }
    }
}

#[derive(Clone)]
pub struct WorkerOptions {
    pub path: PathBuf,
    pub store: StoreOptions,
    pub thread_name: String,
    /// Bound for each shutdown wait: drain, close ack, join
    pub drain_timeout: Duration,
    pub entry: WorkerEntry,
}

impl WorkerOptions {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            store: StoreOptions::default(),
            thread_name: "log-worker".to_string(),
            drain_timeout: crate::core::DEFAULT_SHUTDOWN_TIMEOUT,
            entry: Arc::new(run_file_worker),
        }
    }

    #[must_use]
    pub fn with_store_options(mut self, store: StoreOptions) -> Self {
        self.store = store;
        self
    }

    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    #[must_use]
    pub fn with_drain_timeout(mut self, timeout: Duration) -> Self {
        self.drain_timeout = timeout;
        self
    }

    /// Replace the default file worker
    #[must_use]
    pub fn with_entry(mut self, entry: WorkerEntry) -> Self {
        self.entry = entry;
        self
    }
}

struct ChannelInner {
    state: ChannelState,
    pending: usize,
    close_signal_sent: bool,
    processed: u64,
}

struct ChannelShared {
    inner: Mutex<ChannelInner>,
    changed: Condvar,
    metrics: Arc<LoggerMetrics>,
    on_error: ErrorCallback,
}

impl ChannelShared {
    fn handle_inbound_signal(&self, signal: WorkerSignal) {
        let mut inner = self.inner.lock();
        match signal {
            WorkerSignal::Processed => {
                inner.pending = inner.pending.saturating_sub(1);
                inner.processed += 1;
                self.metrics.record_worker_ack();
            }
            WorkerSignal::Closed => inner.state = ChannelState::Closed,
        }
        self.changed.notify_all();
    }

    /// The worker dropped its signal sender
    fn worker_disconnected(&self) {
        let mut inner = self.inner.lock();
        if inner.state == ChannelState::Closed {
            return;
        }
        let lost = inner.pending;
        inner.state = ChannelState::Closed;
        inner.pending = 0;
        self.changed.notify_all();
        drop(inner);

        self.metrics.record_write_failure(lost as u64);
        (self.on_error)(&LoggerError::worker_terminated(format!(
            "worker exited with {} records in flight",
            lost
        )));
    }
}

/// # Examples
///
/// ```
/// use rust_app_logger::appenders::{StoreOptions, WorkerChannel, WorkerOptions};
/// use rust_app_logger::core::{stderr_reporter, LoggerMetrics};
/// use std::sync::Arc;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("worker.log");
/// let options = WorkerOptions::new(&path).with_store_options(StoreOptions::new().with_header(false));
/// let channel = WorkerChannel::new(options, Arc::new(LoggerMetrics::new()), stderr_reporter());
///
/// channel.start().unwrap();
/// channel.log_to_worker("[INFO ] from the worker".to_string());
/// channel.close_worker().unwrap();
/// assert_eq!(std::fs::read_to_string(&path).unwrap(), "[INFO ] from the worker\n");
/// ```
pub struct WorkerChannel {
    options: WorkerOptions,
    shared: Arc<ChannelShared>,
    /// Lock order: `sender` before `shared.inner`
    sender: Mutex<Option<Sender<WorkerCommand>>>,
    threads: Mutex<Vec<(&'static str, JoinHandle<()>)>>,
}

impl WorkerChannel {
    pub fn new(options: WorkerOptions, metrics: Arc<LoggerMetrics>, on_error: ErrorCallback) -> Self {
        Self {
            options,
            shared: Arc::new(ChannelShared {
                inner: Mutex::new(ChannelInner {
                    state: ChannelState::Uninitialized,
                    pending: 0,
                    close_signal_sent: false,
                    processed: 0,
                }),
                changed: Condvar::new(),
                metrics,
                on_error,
            }),
            sender: Mutex::new(None),
            threads: Mutex::new(Vec::new()),
        }
    }

    /// Spawn the worker and the listener feeding its signals back
    ///
    /// A no-op unless the channel is still uninitialized.
    pub fn start(&self) -> Result<()> {
        let mut sender = self.sender.lock();
        let mut inner = self.shared.inner.lock();
        if inner.state != ChannelState::Uninitialized {
            return Ok(());
        }

        let (command_tx, command_rx) = unbounded();
        let (signal_tx, signal_rx) = unbounded();
        let endpoint = WorkerEndpoint {
            commands: command_rx,
            signals: signal_tx,
            path: self.options.path.clone(),
            store_options: self.options.store.clone(),
            metrics: Arc::clone(&self.shared.metrics),
            on_error: Arc::clone(&self.shared.on_error),
        };

        let entry = Arc::clone(&self.options.entry);
        let worker = thread::Builder::new()
            .name(self.options.thread_name.clone())
            .spawn(move || entry(endpoint))
            .map_err(|e| LoggerError::io_operation("spawning log worker", "spawn failed", e))?;

        let shared = Arc::clone(&self.shared);
        let listener = thread::Builder::new()
            .name(format!("{}-listener", self.options.thread_name))
            .spawn(move || {
                for signal in signal_rx {
                    shared.handle_inbound_signal(signal);
                }
                shared.worker_disconnected();
            })
            .map_err(|e| LoggerError::io_operation("spawning worker listener", "spawn failed", e))?;

        *sender = Some(command_tx);
        self.threads
            .lock()
            .extend([("log worker", worker), ("worker listener", listener)]);
        inner.state = ChannelState::Running;
        Ok(())
    }

    /// Send one record; the in-flight count goes up before the send
    ///
    /// Starts the worker on first use. Returns `false` once closing.
    pub fn log_to_worker(&self, message: String) -> bool {
        if self.state() == ChannelState::Uninitialized {
            if let Err(e) = self.start() {
                (self.shared.on_error)(&e);
                return false;
            }
        }

        let sender = self.sender.lock();
        {
            let mut inner = self.shared.inner.lock();
            if inner.state != ChannelState::Running {
                drop(inner);
                self.shared.metrics.record_rejected();
                return false;
            }
            inner.pending += 1;
        }

        let sent = sender
            .as_ref()
            .is_some_and(|tx| tx.send(WorkerCommand::Log(message)).is_ok());
        if !sent {
            let mut inner = self.shared.inner.lock();
            inner.pending = inner.pending.saturating_sub(1);
            self.shared.changed.notify_all();
            drop(inner);
            self.shared.metrics.record_write_failure(1);
            (self.shared.on_error)(&LoggerError::channel("log worker"));
        }
        sent
    }

    /// Apply one signal from the worker
    pub fn handle_inbound_signal(&self, signal: WorkerSignal) {
        self.shared.handle_inbound_signal(signal);
    }

    /// Drain, then close
    ///
    /// Waits for every in-flight record, sends `close`, waits for `closed`,
    /// then disconnects and joins the threads. Each wait is bounded by the
    /// drain timeout; an expired wait is returned as an error after the
    /// remaining steps ran.
    pub fn close_worker(&self) -> Result<()> {
        let timeout = self.options.drain_timeout;
        let mut result = Ok(());

        let needs_close_signal = {
            let mut inner = self.shared.inner.lock();
            match inner.state {
                ChannelState::Uninitialized => {
                    inner.state = ChannelState::Closed;
                    return Ok(());
                }
                ChannelState::Closing => return Ok(()),
                ChannelState::Closed => false,
                ChannelState::Running => {
                    inner.state = ChannelState::Closing;

                    let deadline = Instant::now() + timeout;
                    while inner.pending > 0 && inner.state != ChannelState::Closed {
                        if self
                            .shared
                            .changed
                            .wait_until(&mut inner, deadline)
                            .timed_out()
                        {
                            break;
                        }
                    }
                    if inner.pending > 0 && inner.state != ChannelState::Closed {
                        result = Err(LoggerError::drain_timeout(inner.pending, timeout));
                    }
                    inner.state != ChannelState::Closed
                }
            }
        };

        if needs_close_signal {
            let sender = self.sender.lock();
            let sent = sender
                .as_ref()
                .is_some_and(|tx| tx.send(WorkerCommand::Close).is_ok());
            let mut inner = self.shared.inner.lock();
            inner.close_signal_sent = sent;

            let deadline = Instant::now() + timeout;
            while sent && inner.state != ChannelState::Closed {
                if self
                    .shared
                    .changed
                    .wait_until(&mut inner, deadline)
                    .timed_out()
                {
                    break;
                }
            }
            if inner.state != ChannelState::Closed {
                inner.state = ChannelState::Closed;
                result = result.and(Err(LoggerError::worker_terminated(
                    "worker did not acknowledge close",
                )));
            }
        }

        // disconnect; a worker still blocked in recv() wakes up and exits
        self.sender.lock().take();

        let threads = std::mem::take(&mut *self.threads.lock());
        for (name, handle) in threads {
            if let Err(e) = join_with_timeout(handle, timeout, name) {
                result = result.and(Err(e));
            }
        }

        result
    }

    /// Block until every record sent so far is acknowledged
    ///
    /// Bounded by the drain timeout; the channel keeps running either way.
    pub fn wait_for_drain(&self) -> Result<()> {
        let timeout = self.options.drain_timeout;
        let deadline = Instant::now() + timeout;
        let mut inner = self.shared.inner.lock();
        while inner.pending > 0 && inner.state != ChannelState::Closed {
            if self
                .shared
                .changed
                .wait_until(&mut inner, deadline)
                .timed_out()
            {
                return Err(LoggerError::drain_timeout(inner.pending, timeout));
            }
        }
        Ok(())
    }

    /// Records sent but not yet acknowledged
    pub fn pending_messages(&self) -> usize {
        self.shared.inner.lock().pending
    }

    pub fn state(&self) -> ChannelState {
        self.shared.inner.lock().state
    }

    pub fn close_signal_sent(&self) -> bool {
        self.shared.inner.lock().close_signal_sent
    }

    pub fn processed_count(&self) -> u64 {
        self.shared.inner.lock().processed
    }

    pub fn options(&self) -> &WorkerOptions {
        &self.options
    }
}

impl Drop for WorkerChannel {
    fn drop(&mut self) {
        if self.state() == ChannelState::Running {
            if let Err(e) = self.close_worker() {
                (self.shared.on_error)(&e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::stderr_reporter;
    use std::fs;
    use tempfile::tempdir;

    fn options(path: &Path) -> WorkerOptions {
        WorkerOptions::new(path)
            .with_store_options(StoreOptions::new().with_header(false))
            .with_drain_timeout(Duration::from_secs(5))
    }

    fn collecting() -> (ErrorCallback, Arc<Mutex<Vec<String>>>) {
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        let callback: ErrorCallback = Arc::new(move |e: &LoggerError| sink.lock().push(e.to_string()));
        (callback, errors)
    }

    #[test]
    fn test_wire_tokens() {
        assert_eq!(WorkerCommand::Close.to_wire(), "close");
        assert_eq!(WorkerCommand::from_wire("close"), WorkerCommand::Close);
        assert_eq!(
            WorkerCommand::from_wire("[INFO ] hi"),
            WorkerCommand::Log("[INFO ] hi".to_string())
        );
        assert_eq!("processed".parse::<WorkerSignal>().unwrap(), WorkerSignal::Processed);
        assert_eq!(WorkerSignal::Closed.to_string(), "closed");
        assert!("done".parse::<WorkerSignal>().is_err());
    }

    #[test]
    fn test_drain_before_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("worker.log");
        let channel = WorkerChannel::new(options(&path), Arc::new(LoggerMetrics::new()), stderr_reporter());

        channel.start().unwrap();
        assert_eq!(channel.state(), ChannelState::Running);
        for i in 0..1000 {
            assert!(channel.log_to_worker(format!("record {}", i)));
        }
        channel.close_worker().unwrap();

        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(channel.pending_messages(), 0);
        assert_eq!(channel.processed_count(), 1000);
        assert!(channel.close_signal_sent());

        let expected: String = (0..1000).map(|i| format!("record {}\n", i)).collect();
        assert_eq!(fs::read_to_string(&path).unwrap(), expected);
    }

    #[test]
    fn test_close_token_payload_is_a_record() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("token.log");
        let channel = WorkerChannel::new(options(&path), Arc::new(LoggerMetrics::new()), stderr_reporter());

        channel.log_to_worker("close".to_string());
        channel.log_to_worker("after".to_string());
        channel.close_worker().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "close\nafter\n");
    }

    #[test]
    fn test_lazy_start_and_rejection_after_close() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("lazy.log");
        let metrics = Arc::new(LoggerMetrics::new());
        let channel = WorkerChannel::new(options(&path), Arc::clone(&metrics), stderr_reporter());

        assert_eq!(channel.state(), ChannelState::Uninitialized);
        assert!(channel.log_to_worker("first".to_string()));
        assert_eq!(channel.state(), ChannelState::Running);

        channel.close_worker().unwrap();
        assert!(channel.close_worker().is_ok());
        assert!(!channel.log_to_worker("late".to_string()));
        assert_eq!(metrics.rejected(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\n");
    }

    #[test]
    fn test_unexpected_exit_is_reported() {
        let dir = tempdir().unwrap();
        let (on_error, errors) = collecting();
        // exits without acknowledging anything
        let entry: WorkerEntry = Arc::new(|endpoint: WorkerEndpoint| {
            let _ = endpoint.recv();
        });
        let channel = WorkerChannel::new(
            options(&dir.path().join("crash.log")).with_entry(entry),
            Arc::new(LoggerMetrics::new()),
            on_error,
        );

        channel.log_to_worker("lost".to_string());
        let deadline = Instant::now() + Duration::from_secs(5);
        while channel.state() != ChannelState::Closed && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }

        assert_eq!(channel.state(), ChannelState::Closed);
        assert_eq!(channel.pending_messages(), 0);
        assert!(errors.lock().iter().any(|e| e.contains("terminated unexpectedly")));
        assert!(channel.close_worker().is_ok());
    }

    #[test]
    fn test_unresponsive_worker_times_out() {
        let dir = tempdir().unwrap();
        let (on_error, _errors) = collecting();
        // consumes commands but never signals back
        let entry: WorkerEntry = Arc::new(|endpoint: WorkerEndpoint| {
            while endpoint.recv().is_some() {}
        });
        let channel = WorkerChannel::new(
            options(&dir.path().join("silent.log"))
                .with_entry(entry)
                .with_drain_timeout(Duration::from_millis(50)),
            Arc::new(LoggerMetrics::new()),
            on_error,
        );

        channel.log_to_worker("never acked".to_string());
        let started = Instant::now();
        let result = channel.close_worker();

        assert!(matches!(result, Err(LoggerError::DrainTimeout { pending: 1, .. })));
        assert_eq!(channel.state(), ChannelState::Closed);
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
