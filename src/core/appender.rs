//! Appender trait for byte-oriented log destinations

use super::error::Result;
use parking_lot::Mutex;
use std::sync::Arc;

/// A destination that persists already-rendered record bytes
pub trait Appender: Send {
    /// Append `bytes` exactly as given
    fn append(&mut self, bytes: &[u8]) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
    /// Release the underlying handle; calling it twice is a no-op
    fn close(&mut self) -> Result<()>;
    fn name(&self) -> &str;
}

/// An appender shared between the logger and its delivery path.
///
/// The mutex serializes writes, so at most one write is in flight per
/// appender.
pub type SharedAppender = Arc<Mutex<Box<dyn Appender>>>;

pub fn shared(appender: impl Appender + 'static) -> SharedAppender {
    Arc::new(Mutex::new(Box::new(appender)))
}
