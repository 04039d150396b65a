//! Async appender trait for non-blocking log output

use super::error::Result;
use async_trait::async_trait;

/// Trait for asynchronous appenders
///
/// Operations resolve to a `Result` instead of blocking the caller; a
/// failure is never raised synchronously.
#[async_trait]
pub trait AsyncAppender: Send + Sync {
    /// Append bytes asynchronously
    async fn append_async(&self, bytes: Vec<u8>) -> Result<()>;

    /// Close asynchronously; a second call is a no-op
    async fn close_async(&self) -> Result<()>;

    /// Get the appender name
    fn name(&self) -> &str;
}
