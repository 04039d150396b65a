//! Delivery metrics for observability
//!
//! Counters shared by the file store, delivery handler and worker channel
//! so operators can tell whether file logging is healthy.

use std::sync::atomic::{AtomicU64, Ordering};

/// # Example
///
/// ```
/// use rust_app_logger::LoggerMetrics;
///
/// let metrics = LoggerMetrics::new();
/// metrics.record_written(3);
/// metrics.record_write_failure(1);
///
/// assert_eq!(metrics.records_written(), 3);
/// assert_eq!(metrics.write_failures(), 1);
/// ```
#[derive(Debug)]
pub struct LoggerMetrics {
    /// Records that reached a file store
    records_written: AtomicU64,

    /// Records lost to a failed write
    write_failures: AtomicU64,

    /// Records refused because their path was closed
    rejected: AtomicU64,

    /// Batch flushes that wrote data
    flushes: AtomicU64,

    rotations: AtomicU64,

    /// Rotated files deleted by retention
    files_pruned: AtomicU64,

    /// "processed" acknowledgements received from the worker
    worker_acks: AtomicU64,
}

impl LoggerMetrics {
    pub const fn new() -> Self {
        Self {
            records_written: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            flushes: AtomicU64::new(0),
            rotations: AtomicU64::new(0),
            files_pruned: AtomicU64::new(0),
            worker_acks: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn records_written(&self) -> u64 {
        self.records_written.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn write_failures(&self) -> u64 {
        self.write_failures.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn flushes(&self) -> u64 {
        self.flushes.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn rotations(&self) -> u64 {
        self.rotations.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn files_pruned(&self) -> u64 {
        self.files_pruned.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn worker_acks(&self) -> u64 {
        self.worker_acks.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn record_written(&self, count: u64) {
        self.records_written.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_write_failure(&self, count: u64) {
        self.write_failures.fetch_add(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_flush(&self) {
        self.flushes.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_rotation(&self) {
        self.rotations.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_pruned(&self) {
        self.files_pruned.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_worker_ack(&self) {
        self.worker_acks.fetch_add(1, Ordering::Relaxed);
    }

    /// Share of file-bound records that were lost, 0.0 - 100.0
    pub fn failure_rate(&self) -> f64 {
        let failed = self.write_failures() as f64;
        let total = self.records_written() as f64 + failed;
        if total == 0.0 {
            0.0
        } else {
            (failed / total) * 100.0
        }
    }
}

impl Default for LoggerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for LoggerMetrics {
    /// Create a snapshot of the current metrics values
    fn clone(&self) -> Self {
        Self {
            records_written: AtomicU64::new(self.records_written()),
            write_failures: AtomicU64::new(self.write_failures()),
            rejected: AtomicU64::new(self.rejected()),
            flushes: AtomicU64::new(self.flushes()),
            rotations: AtomicU64::new(self.rotations()),
            files_pruned: AtomicU64::new(self.files_pruned()),
            worker_acks: AtomicU64::new(self.worker_acks()),
        }
    }
}
