//! Delivery handler
//!
//! Mode-aware gateway between the logger and its file store. The strategy
//! is picked once at construction; the per-record path is a single match.

use super::batch_queue::BatchQueue;
use super::join_with_timeout;
use crate::core::{
    DeliveryMode, ErrorCallback, LoggerConfig, LoggerError, LoggerMetrics, Result, SharedAppender,
};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerOptions {
    /// Pending records that trigger an early batch flush
    pub batch_size: usize,
    pub flush_interval: Duration,
    /// Bound for joins and drains during close
    pub drain_timeout: Duration,
}

impl Default for HandlerOptions {
    fn default() -> Self {
        Self {
            batch_size: 100,
            flush_interval: Duration::from_secs(1),
            drain_timeout: crate::core::DEFAULT_SHUTDOWN_TIMEOUT,
        }
    }
}

impl HandlerOptions {
    pub fn from_config(config: &LoggerConfig) -> Self {
        Self {
            batch_size: config.queue_batch_size,
            flush_interval: config.flush_interval(),
            drain_timeout: config.drain_timeout(),
        }
    }
}

enum Message {
    Record(String),
    /// Barrier: acknowledged once every earlier record is written
    Flush(Sender<()>),
    Shutdown,
}

/// Single writer thread fed by an unbounded channel
struct DeferredWriter {
    sender: Sender<Message>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl DeferredWriter {
    fn start(
        store: SharedAppender,
        metrics: Arc<LoggerMetrics>,
        on_error: ErrorCallback,
    ) -> Result<Self> {
        let (sender, receiver) = unbounded();
        let handle = thread::Builder::new()
            .name("log-deferred-writer".to_string())
            .spawn(move || run_deferred_writer(store, receiver, metrics, on_error))
            .map_err(|e| {
                LoggerError::io_operation("spawning deferred writer", "spawn failed", e)
            })?;

        Ok(Self {
            sender,
            handle: Mutex::new(Some(handle)),
        })
    }
}

fn run_deferred_writer(
    store: SharedAppender,
    receiver: Receiver<Message>,
    metrics: Arc<LoggerMetrics>,
    on_error: ErrorCallback,
) {
    for message in receiver {
        match message {
            Message::Record(line) => {
                let outcome = store.lock().append(line.as_bytes());
                match outcome {
                    Ok(()) => metrics.record_written(1),
                    Err(e) => {
                        metrics.record_write_failure(1);
                        on_error(&e);
                    }
                }
            }
            Message::Flush(ack) => {
                let outcome = store.lock().flush();
                if let Err(e) = outcome {
                    on_error(&e);
                }
                let _ = ack.send(());
            }
            Message::Shutdown => break,
        }
    }
}

enum Strategy {
    Immediate,
    Deferred(DeferredWriter),
    Batched(BatchQueue),
}

/// # Examples
///
/// ```
/// use rust_app_logger::appenders::{DeliveryHandler, HandlerOptions, RotatingFileStore, StoreOptions};
/// use rust_app_logger::core::{shared, stderr_reporter, DeliveryMode, LoggerMetrics};
/// use std::sync::Arc;
///
/// let dir = tempfile::tempdir().unwrap();
/// let path = dir.path().join("app.log");
/// let store = RotatingFileStore::open(&path, StoreOptions::new().with_header(false)).unwrap();
///
/// let handler = DeliveryHandler::new(
///     DeliveryMode::Deferred,
///     shared(store),
///     HandlerOptions::default(),
///     Arc::new(LoggerMetrics::new()),
///     stderr_reporter(),
/// ).unwrap();
///
/// handler.log("[INFO ] deferred write");
/// handler.flush().unwrap();
/// handler.close().unwrap();
/// assert_eq!(std::fs::read_to_string(&path).unwrap(), "[INFO ] deferred write\n");
/// ```
pub struct DeliveryHandler {
    mode: DeliveryMode,
    store: SharedAppender,
    strategy: Strategy,
    options: HandlerOptions,
    /// Read-held by every log call, write-held while closing
    closed: RwLock<bool>,
    metrics: Arc<LoggerMetrics>,
    on_error: ErrorCallback,
}

impl DeliveryHandler {
    /// Select the strategy for `mode` and start its thread, if any
    ///
    /// # Errors
    ///
    /// Worker mode is not a handler strategy and is rejected.
    pub fn new(
        mode: DeliveryMode,
        store: SharedAppender,
        options: HandlerOptions,
        metrics: Arc<LoggerMetrics>,
        on_error: ErrorCallback,
    ) -> Result<Self> {
        let strategy = match mode {
            DeliveryMode::Immediate => Strategy::Immediate,
            DeliveryMode::Deferred => Strategy::Deferred(DeferredWriter::start(
                Arc::clone(&store),
                Arc::clone(&metrics),
                Arc::clone(&on_error),
            )?),
            DeliveryMode::BatchedQueue => Strategy::Batched(BatchQueue::start(
                Arc::clone(&store),
                options.batch_size,
                options.flush_interval,
                Arc::clone(&metrics),
                Arc::clone(&on_error),
            )?),
            DeliveryMode::WorkerOffload => {
                return Err(LoggerError::config(
                    "DeliveryHandler",
                    "worker mode is delivered through WorkerChannel",
                ))
            }
        };

        Ok(Self {
            mode,
            store,
            strategy,
            options,
            closed: RwLock::new(false),
            metrics,
            on_error,
        })
    }

    /// Deliver one plain record; returns whether it was accepted
    ///
    /// Write failures are reported, never returned.
    pub fn log(&self, message: &str) -> bool {
        let closed = self.closed.read_recursive();
        if *closed {
            self.metrics.record_rejected();
            return false;
        }

        match self.strategy {
            Strategy::Immediate => {
                let line = format!("{}\n", message);
                // released before the error callback, which may log again
                let outcome = self.store.lock().append(line.as_bytes());
                match outcome {
                    Ok(()) => self.metrics.record_written(1),
                    Err(e) => {
                        self.metrics.record_write_failure(1);
                        (self.on_error)(&e);
                    }
                }
                true
            }
            Strategy::Deferred(ref writer) => {
                let line = format!("{}\n", message);
                if writer.sender.send(Message::Record(line)).is_err() {
                    self.metrics.record_write_failure(1);
                    (self.on_error)(&LoggerError::channel("deferred writer"));
                    return false;
                }
                true
            }
            Strategy::Batched(ref queue) => queue.enqueue_log(message),
        }
    }

    /// Queue a record for the next batch; other modes deliver it directly
    pub fn enqueue_log(&self, message: &str) -> bool {
        match self.strategy {
            Strategy::Batched(ref queue) => {
                if *self.closed.read() {
                    self.metrics.record_rejected();
                    return false;
                }
                queue.enqueue_log(message)
            }
            _ => self.log(message),
        }
    }

    /// Non-blocking batch flush; `false` if nothing was written
    pub fn flush_queue(&self) -> bool {
        match self.strategy {
            Strategy::Batched(ref queue) => queue.flush_queue(),
            _ => false,
        }
    }

    /// Barrier: every record accepted so far has reached the store
    pub fn flush(&self) -> Result<()> {
        match self.strategy {
            Strategy::Immediate => {}
            Strategy::Deferred(ref writer) => {
                let (ack, done) = bounded(1);
                if writer.sender.send(Message::Flush(ack)).is_ok() {
                    done.recv_timeout(self.options.drain_timeout).map_err(|_| {
                        LoggerError::other(format!(
                            "deferred writer did not flush within {:?}",
                            self.options.drain_timeout
                        ))
                    })?;
                }
            }
            Strategy::Batched(ref queue) => queue.flush_blocking(),
        }
        self.store.lock().flush()
    }

    /// Stop accepting records and drain everything already accepted
    ///
    /// Idempotent. The store itself stays open; the logger closes it.
    pub fn close(&self) -> Result<()> {
        {
            let mut closed = self.closed.write();
            if *closed {
                return Ok(());
            }
            *closed = true;
        }

        match self.strategy {
            Strategy::Immediate => Ok(()),
            Strategy::Deferred(ref writer) => {
                let _ = writer.sender.send(Message::Shutdown);
                match writer.handle.lock().take() {
                    Some(handle) => {
                        join_with_timeout(handle, self.options.drain_timeout, "deferred writer")
                    }
                    None => Ok(()),
                }
            }
            Strategy::Batched(ref queue) => queue.close(self.options.drain_timeout),
        }
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read()
    }

    pub fn mode(&self) -> DeliveryMode {
        self.mode
    }

    pub fn pending_len(&self) -> usize {
        match self.strategy {
            Strategy::Batched(ref queue) => queue.pending_len(),
            Strategy::Deferred(ref writer) => writer.sender.len(),
            Strategy::Immediate => 0,
        }
    }

    pub fn is_flushing(&self) -> bool {
        match self.strategy {
            Strategy::Batched(ref queue) => queue.is_flushing(),
            _ => false,
        }
    }
}

impl Drop for DeliveryHandler {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            (self.on_error)(&e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::appenders::{RotatingFileStore, StoreOptions};
    use crate::core::{shared, stderr_reporter, Appender};
    use std::fs;
    use tempfile::tempdir;

    fn handler(mode: DeliveryMode, path: &std::path::Path) -> DeliveryHandler {
        let store = RotatingFileStore::open(path, StoreOptions::new().with_header(false)).unwrap();
        DeliveryHandler::new(
            mode,
            shared(store),
            HandlerOptions {
                batch_size: 5,
                flush_interval: Duration::from_secs(60),
                drain_timeout: Duration::from_secs(5),
            },
            Arc::new(LoggerMetrics::new()),
            stderr_reporter(),
        )
        .unwrap()
    }

    fn expected(n: usize) -> String {
        (0..n).map(|i| format!("line {}\n", i)).collect()
    }

    #[test]
    fn test_immediate_writes_synchronously() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("immediate.log");
        let handler = handler(DeliveryMode::Immediate, &path);

        handler.log("line 0");
        assert_eq!(fs::read_to_string(&path).unwrap(), "line 0\n");
        assert_eq!(handler.mode(), DeliveryMode::Immediate);
    }

    #[test]
    fn test_deferred_preserves_order() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("deferred.log");
        let handler = handler(DeliveryMode::Deferred, &path);

        for i in 0..200 {
            assert!(handler.log(&format!("line {}", i)));
        }
        handler.flush().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), expected(200));
        handler.close().unwrap();
    }

    #[test]
    fn test_batched_close_drains_everything() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("batched.log");
        let handler = handler(DeliveryMode::BatchedQueue, &path);

        for i in 0..13 {
            handler.enqueue_log(&format!("line {}", i));
        }
        handler.close().unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), expected(13));
        assert_eq!(handler.pending_len(), 0);
        assert!(!handler.is_flushing());
    }

    #[test]
    fn test_worker_mode_rejected() {
        let dir = tempdir().unwrap();
        let store =
            RotatingFileStore::open(dir.path().join("w.log"), StoreOptions::new()).unwrap();
        let result = DeliveryHandler::new(
            DeliveryMode::WorkerOffload,
            shared(store),
            HandlerOptions::default(),
            Arc::new(LoggerMetrics::new()),
            stderr_reporter(),
        );
        assert!(matches!(result, Err(LoggerError::InvalidConfiguration { .. })));
    }

    #[test]
    fn test_log_after_close_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("closed.log");

        for mode in [
            DeliveryMode::Immediate,
            DeliveryMode::Deferred,
            DeliveryMode::BatchedQueue,
        ] {
            let handler = handler(mode, &path);
            handler.close().unwrap();
            assert!(handler.close().is_ok());
            assert!(handler.is_closed());
            assert!(!handler.log("too late"), "{} accepted after close", mode);
        }
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    struct Unwritable;

    impl Appender for Unwritable {
        fn append(&mut self, _bytes: &[u8]) -> Result<()> {
            Err(LoggerError::file_appender("memory", "read-only"))
        }

        fn flush(&mut self) -> Result<()> {
            Ok(())
        }

        fn close(&mut self) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &str {
            "unwritable"
        }
    }

    #[test]
    fn test_error_callback_runs_with_store_unlocked() {
        for mode in [
            DeliveryMode::Immediate,
            DeliveryMode::Deferred,
            DeliveryMode::BatchedQueue,
        ] {
            let store = shared(Unwritable);
            let watched = Arc::clone(&store);
            let store_free = Arc::new(Mutex::new(Vec::new()));
            let seen = Arc::clone(&store_free);

            let handler = DeliveryHandler::new(
                mode,
                store,
                HandlerOptions {
                    batch_size: 100,
                    flush_interval: Duration::from_secs(60),
                    drain_timeout: Duration::from_secs(5),
                },
                Arc::new(LoggerMetrics::new()),
                Arc::new(move |_: &LoggerError| seen.lock().push(watched.try_lock().is_some())),
            )
            .unwrap();

            handler.log("doomed");
            handler.flush().unwrap();
            handler.close().unwrap();

            let observed = store_free.lock().clone();
            assert_eq!(observed, vec![true], "mode {}", mode);
        }
    }
}
