//! Delivery paths and the file store they feed

pub mod batch_queue;
pub mod console;
pub mod delivery;
pub mod rotating_file;
pub mod worker;

#[cfg(feature = "async-appenders")]
pub mod async_file;

pub use batch_queue::BatchQueue;
pub use console::ConsoleSink;
pub use delivery::{DeliveryHandler, HandlerOptions};
pub use rotating_file::{RotatingFileStore, StoreOptions};
pub use worker::{
    run_file_worker, ChannelState, WorkerChannel, WorkerCommand, WorkerEndpoint, WorkerEntry,
    WorkerOptions, WorkerSignal,
};

#[cfg(feature = "async-appenders")]
pub use async_file::AsyncRotatingFileStore;

pub use crate::core::Appender;
#[cfg(feature = "async-appenders")]
pub use crate::core::AsyncAppender;

use crate::core::{LoggerError, Result};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Join a delivery thread, giving up after `timeout`
///
/// A thread that outlives the timeout is left detached.
pub(crate) fn join_with_timeout(
    handle: JoinHandle<()>,
    timeout: Duration,
    what: &str,
) -> Result<()> {
    let start = Instant::now();

    loop {
        if handle.is_finished() {
            // Thread finished, join it to check for panics
            return handle
                .join()
                .map_err(|_| LoggerError::worker_terminated(format!("{} thread panicked", what)));
        }

        if start.elapsed() >= timeout {
            return Err(LoggerError::other(format!(
                "{} thread did not finish within {:?}",
                what, timeout
            )));
        }

        // Small sleep to avoid busy-waiting
        thread::sleep(Duration::from_millis(5));
    }
}
