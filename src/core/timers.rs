//! Labelled timers and the call-count report

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt::Write as _;
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct Timers {
    started: Mutex<HashMap<String, Instant>>,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the timer named `label`
    pub fn start(&self, label: &str) {
        self.started.lock().insert(label.to_string(), Instant::now());
    }

    /// Stop the timer; `None` if it was never started
    pub fn end(&self, label: &str) -> Option<Duration> {
        self.started
            .lock()
            .remove(label)
            .map(|start| start.elapsed())
    }

    pub fn is_running(&self, label: &str) -> bool {
        self.started.lock().contains_key(label)
    }
}

/// Counts delivered log calls per level label
#[derive(Debug, Default)]
pub struct CallReport {
    counts: Mutex<BTreeMap<String, u64>>,
}

impl CallReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, label: &str) {
        *self.counts.lock().entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn count(&self, label: &str) -> u64 {
        self.counts.lock().get(label).copied().unwrap_or(0)
    }

    pub fn total(&self) -> u64 {
        self.counts.lock().values().sum()
    }

    /// ```text
    /// === log call report ===
    /// ERROR: 1
    /// INFO: 4
    /// total: 5
    /// ```
    pub fn render(&self) -> String {
        let counts = self.counts.lock();
        let mut out = String::from("=== log call report ===\n");
        for (label, count) in counts.iter() {
            let _ = writeln!(out, "{}: {}", label, count);
        }
        let _ = write!(out, "total: {}", counts.values().sum::<u64>());
        out
    }
}
