//! Periodic process memory sampling
//!
//! A background thread refreshes the resident set size of this process at a
//! fixed interval. Log calls only read the latest sample.

use super::error::{LoggerError, Result};
use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use sysinfo::{Pid, ProcessRefreshKind, ProcessesToUpdate, System};

struct ProcessSampler {
    system: System,
    pid: Option<Pid>,
}

impl ProcessSampler {
    fn new() -> Self {
        Self {
            system: System::new(),
            pid: sysinfo::get_current_pid().ok(),
        }
    }

    fn sample(&mut self) -> Option<u64> {
        let pid = self.pid?;
        self.system.refresh_processes_specifics(
            ProcessesToUpdate::Some(&[pid]),
            true,
            ProcessRefreshKind::nothing().with_memory(),
        );
        self.system.process(pid).map(|process| process.memory())
    }
}

/// Resident memory of the current process in bytes, if the OS reports it
pub fn sample_process_memory() -> Option<u64> {
    ProcessSampler::new().sample()
}

/// Human readable size: `512 B`, `1.50 KB`, `12.34 MB`
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["KB", "MB", "GB", "TB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }
    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", value, UNITS[unit])
}

pub struct MemorySampler {
    /// Latest sample in bytes; 0 until one succeeded
    latest: Arc<AtomicU64>,
    stop: Mutex<Option<Sender<()>>>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl MemorySampler {
    /// Take one sample now and keep sampling every `interval`
    pub fn start(interval: Duration) -> Result<Self> {
        let mut sampler = ProcessSampler::new();
        let latest = Arc::new(AtomicU64::new(sampler.sample().unwrap_or(0)));

        let (stop, stopped) = bounded::<()>(1);
        let shared = Arc::clone(&latest);
        let handle = thread::Builder::new()
            .name("log-memory-sampler".to_string())
            .spawn(move || loop {
                match stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        if let Some(bytes) = sampler.sample() {
                            shared.store(bytes, Ordering::Relaxed);
                        }
                    }
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| LoggerError::io_operation("spawning memory sampler", "spawn failed", e))?;

        Ok(Self {
            latest,
            stop: Mutex::new(Some(stop)),
            handle: Mutex::new(Some(handle)),
        })
    }

    pub fn latest_bytes(&self) -> Option<u64> {
        match self.latest.load(Ordering::Relaxed) {
            0 => None,
            bytes => Some(bytes),
        }
    }

    pub fn latest_formatted(&self) -> Option<String> {
        self.latest_bytes().map(format_bytes)
    }

    pub fn is_running(&self) -> bool {
        self.stop.lock().is_some()
    }

    /// Stop the sampling thread; later calls are no-ops
    pub fn stop(&self) {
        // dropping the sender wakes the thread immediately
        drop(self.stop.lock().take());
        if let Some(handle) = self.handle.lock().take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MemorySampler {
    fn drop(&mut self) {
        self.stop();
    }
}
