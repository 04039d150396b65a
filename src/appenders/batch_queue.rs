//! Batched queue delivery
//!
//! Records accumulate in `pending` and leave in one append per batch, either
//! when `batch_size` is reached or when the flush interval elapses. A single
//! flush lock guarantees at most one flush in flight; whoever loses the race
//! simply skips, the winner takes everything pending at that moment.

use super::join_with_timeout;
use crate::core::{ErrorCallback, LoggerError, LoggerMetrics, Result, SharedAppender};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Records waiting for the file
///
/// `open` is the batch still filling. Batches that hit `batch_size` are
/// sealed by the enqueuing thread and wait, in order, for the next writer.
#[derive(Default)]
struct Pending {
    open: Vec<String>,
    sealed: VecDeque<Vec<String>>,
}

impl Pending {
    fn take_all(&mut self) -> Vec<Vec<String>> {
        let mut batches: Vec<Vec<String>> = self.sealed.drain(..).collect();
        if !self.open.is_empty() {
            batches.push(std::mem::take(&mut self.open));
        }
        batches
    }
}

struct BatchState {
    store: SharedAppender,
    pending: Mutex<Pending>,
    /// Held for the duration of a flush; locked means flushing
    flush_lock: Mutex<()>,
    shutting_down: AtomicBool,
    closed: AtomicBool,
    batch_size: usize,
    metrics: Arc<LoggerMetrics>,
    on_error: ErrorCallback,
}

impl BatchState {
    fn flush_queue(&self) -> bool {
        let Some(_flushing) = self.flush_lock.try_lock() else {
            return false;
        };
        self.write_pending()
    }

    /// Write what is pending at this moment, sealed batches oldest first,
    /// then the open one; caller holds the flush lock
    fn write_pending(&self) -> bool {
        let batches = self.pending.lock().take_all();
        if batches.is_empty() {
            return false;
        }
        for batch in batches {
            self.write_batch(batch);
        }
        true
    }

    fn write_batch(&self, batch: Vec<String>) {
        let count = batch.len() as u64;
        let mut payload = batch.join("\n");
        payload.push('\n');

        // the store guard must be gone before the error callback runs
        let outcome = self.store.lock().append(payload.as_bytes());
        match outcome {
            Ok(()) => {
                self.metrics.record_written(count);
                self.metrics.record_flush();
            }
            Err(e) => {
                // the batch is dropped, only the failure survives
                self.metrics.record_write_failure(count);
                (self.on_error)(&e);
            }
        }
    }
}

/// # Examples
///
/// ```
/// use rust_app_logger::appenders::{BatchQueue, RotatingFileStore, StoreOptions};
/// use rust_app_logger::core::{shared, stderr_reporter, LoggerMetrics};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let dir = tempfile::tempdir().unwrap();
/// let store = RotatingFileStore::open(dir.path().join("app.log"), StoreOptions::new()).unwrap();
/// let queue = BatchQueue::start(
///     shared(store),
///     10,
///     Duration::from_secs(1),
///     Arc::new(LoggerMetrics::new()),
///     stderr_reporter(),
/// ).unwrap();
///
/// queue.enqueue_log("first");
/// queue.close(Duration::from_secs(5)).unwrap();
/// ```
pub struct BatchQueue {
    state: Arc<BatchState>,
    wake: Sender<()>,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl BatchQueue {
    /// Create the queue and spawn its periodic flush thread
    pub fn start(
        store: SharedAppender,
        batch_size: usize,
        flush_interval: Duration,
        metrics: Arc<LoggerMetrics>,
        on_error: ErrorCallback,
    ) -> Result<Self> {
        let state = Arc::new(BatchState {
            store,
            pending: Mutex::new(Pending::default()),
            flush_lock: Mutex::new(()),
            shutting_down: AtomicBool::new(false),
            closed: AtomicBool::new(false),
            batch_size: batch_size.max(1),
            metrics,
            on_error,
        });

        // one slot is enough: a wake already queued covers later ones
        let (wake, wake_rx) = bounded(1);
        let loop_state = Arc::clone(&state);
        let flusher = thread::Builder::new()
            .name("log-batch-flusher".to_string())
            .spawn(move || run_flush_loop(loop_state, wake_rx, flush_interval))
            .map_err(|e| {
                LoggerError::io_operation("spawning batch flush thread", "spawn failed", e)
            })?;

        Ok(Self {
            state,
            wake,
            flusher: Mutex::new(Some(flusher)),
        })
    }

    /// Queue one record; refused once shutdown has begun
    ///
    /// The record that completes a batch seals it on the calling thread, so
    /// `pending_len()` is back to zero when this returns. The write itself
    /// happens on the flush thread.
    pub fn enqueue_log(&self, message: &str) -> bool {
        let sealed = {
            let mut pending = self.state.pending.lock();
            if self.state.shutting_down.load(Ordering::Acquire) {
                drop(pending);
                self.state.metrics.record_rejected();
                return false;
            }
            pending.open.push(message.to_string());
            if pending.open.len() >= self.state.batch_size {
                let batch = std::mem::take(&mut pending.open);
                pending.sealed.push_back(batch);
                true
            } else {
                false
            }
        };

        if sealed {
            let _ = self.wake.try_send(());
        }
        true
    }

    /// Write all pending records unless a flush is already running
    ///
    /// Returns whether this call wrote a batch.
    pub fn flush_queue(&self) -> bool {
        self.state.flush_queue()
    }

    /// Wait for any running flush, then write what is left
    pub fn flush_blocking(&self) {
        let _flushing = self.state.flush_lock.lock();
        self.state.write_pending();
    }

    /// Stop accepting records, stop the flush loop and drain the remainder
    ///
    /// Idempotent. Everything enqueued before the call reaches the store.
    pub fn close(&self, timeout: Duration) -> Result<()> {
        {
            // taken under the pending lock so no enqueue slips past
            let _pending = self.state.pending.lock();
            if self.state.shutting_down.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
        }

        let _ = self.wake.try_send(());
        let mut result = Ok(());
        if let Some(handle) = self.flusher.lock().take() {
            result = join_with_timeout(handle, timeout, "batch flush");
        }

        match self.state.flush_lock.try_lock_for(timeout) {
            Some(_flushing) => {
                self.state.write_pending();
            }
            None => {
                let pending = self.pending_len() + self.sealed_len();
                result = result.and(Err(LoggerError::drain_timeout(pending, timeout)));
            }
        }

        self.state.closed.store(true, Ordering::Release);
        result
    }

    /// Records in the batch still filling
    pub fn pending_len(&self) -> usize {
        self.state.pending.lock().open.len()
    }

    /// Records sealed into full batches but not yet written
    pub fn sealed_len(&self) -> usize {
        self.state.pending.lock().sealed.iter().map(Vec::len).sum()
    }

    pub fn is_flushing(&self) -> bool {
        self.state.flush_lock.is_locked()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.state.shutting_down.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::Acquire)
    }
}

impl Drop for BatchQueue {
    fn drop(&mut self) {
        if !self.is_shutting_down() {
            if let Err(e) = self.close(crate::core::DEFAULT_SHUTDOWN_TIMEOUT) {
                (self.state.on_error)(&e);
            }
        }
    }
}

fn run_flush_loop(state: Arc<BatchState>, wake: Receiver<()>, interval: Duration) {
    loop {
        match wake.recv_timeout(interval) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        // the final drain belongs to close()
        if state.shutting_down.load(Ordering::Acquire) {
            break;
        }
        // wait out a running flush so a batch sealed meanwhile is not left
        // behind until the next tick
        let _flushing = state.flush_lock.lock();
        state.write_pending();
    }
}
