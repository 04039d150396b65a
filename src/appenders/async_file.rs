//! Async façade over the rotating file store
//!
//! File IO stays blocking; each operation runs on tokio's blocking pool so
//! an async caller never stalls its executor. Failures resolve as `Err`.

use super::rotating_file::{RotatingFileStore, StoreOptions};
use crate::core::{AsyncAppender, LoggerError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// # Example
///
/// ```no_run
/// use rust_app_logger::appenders::{AsyncRotatingFileStore, StoreOptions};
/// use rust_app_logger::core::AsyncAppender;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = AsyncRotatingFileStore::open("app.log", StoreOptions::new()).await?;
/// store.append_async(b"Hello async world!\n".to_vec()).await?;
/// store.close_async().await?;
/// # Ok(())
/// # }
/// ```
pub struct AsyncRotatingFileStore {
    inner: Arc<Mutex<RotatingFileStore>>,
    path: PathBuf,
}

impl AsyncRotatingFileStore {
    /// Open the store on the blocking pool
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be created or opened
    pub async fn open(path: impl AsRef<Path>, options: StoreOptions) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let open_path = path.clone();
        let store = tokio::task::spawn_blocking(move || RotatingFileStore::open(open_path, options))
            .await
            .map_err(join_error)??;

        Ok(Self {
            inner: Arc::new(Mutex::new(store)),
            path,
        })
    }

    /// Wrap an already opened store
    pub fn from_store(store: RotatingFileStore) -> Self {
        let path = store.path().to_path_buf();
        Self {
            inner: Arc::new(Mutex::new(store)),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_size(&self) -> u64 {
        self.inner.lock().current_size()
    }
}

fn join_error(e: tokio::task::JoinError) -> LoggerError {
    LoggerError::other(format!("blocking file task failed: {}", e))
}

#[async_trait]
impl AsyncAppender for AsyncRotatingFileStore {
    async fn append_async(&self, bytes: Vec<u8>) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.lock().append(&bytes))
            .await
            .map_err(join_error)?
    }

    async fn close_async(&self) -> Result<()> {
        let inner = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || inner.lock().close())
            .await
            .map_err(join_error)?
    }

    fn name(&self) -> &str {
        "async_rotating_file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_async_store_creation() {
        let dir = tempdir().expect("Failed to create temp dir");
        let log_path = dir.path().join("test.log");

        let store = AsyncRotatingFileStore::open(&log_path, StoreOptions::new().with_header(false))
            .await
            .expect("Failed to open store");

        assert_eq!(store.path(), log_path.as_path());
        assert_eq!(store.current_size(), 0);
    }

    #[tokio::test]
    async fn test_async_store_multiple_writes() {
        let dir = tempdir().expect("Failed to create temp dir");
        let log_path = dir.path().join("test.log");

        let store = AsyncRotatingFileStore::open(&log_path, StoreOptions::new().with_header(false))
            .await
            .expect("Failed to open store");

        for i in 0..10 {
            store
                .append_async(format!("Message {}\n", i).into_bytes())
                .await
                .expect("Failed to append");
        }
        store.close_async().await.expect("Failed to close");

        let content = tokio::fs::read_to_string(&log_path).await.unwrap();
        assert_eq!(content.lines().count(), 10);
        assert!(content.starts_with("Message 0\n"));
    }

    #[tokio::test]
    async fn test_append_after_close_resolves_to_error() {
        let dir = tempdir().expect("Failed to create temp dir");
        let store = AsyncRotatingFileStore::open(dir.path().join("c.log"), StoreOptions::new())
            .await
            .unwrap();

        store.close_async().await.unwrap();
        assert!(store.close_async().await.is_ok());
        let result = store.append_async(b"late\n".to_vec()).await;
        assert!(matches!(result, Err(LoggerError::LoggerStopped)));
    }
}
