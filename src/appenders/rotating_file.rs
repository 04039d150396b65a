//! Rotating file store with size-based rotation and count-based retention
//!
//! The store owns one physical log file. File size and the list of rotated
//! siblings are cached in memory: one stat and one directory scan happen at
//! open, after that every append and rotation updates the cache with plain
//! arithmetic. This is only valid with a single writer per file, which holds
//! within one process as long as a path is owned by a single store.

use crate::core::appender::Appender;
use crate::core::error::{stderr_reporter, ErrorCallback, LoggerError, Result};
use crate::core::metrics::LoggerMetrics;
use crate::core::timestamp::{parse_rotation_stamp, rotation_stamp, TimestampFormat};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Length of a rotation stamp such as `2025-01-08T10-30-45-123Z`
const STAMP_LEN: usize = 24;

/// Rotation and retention thresholds
///
/// # Examples
///
/// ```
/// use rust_app_logger::appenders::StoreOptions;
///
/// let options = StoreOptions::new()
///     .with_max_size_mb(1.0)
///     .with_max_retained(3)
///     .with_header(false);
/// assert_eq!(options.max_size_bytes, 1024 * 1024);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreOptions {
    /// Rotate once the active file holds at least this many bytes
    pub max_size_bytes: u64,
    /// Rotated files kept on disk, oldest deleted first
    pub max_retained: usize,
    /// Write a session header whenever a file is opened
    pub write_header: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_size_bytes: 10 * 1024 * 1024,
            max_retained: 5,
            write_header: true,
        }
    }
}

impl StoreOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size(mut self, bytes: u64) -> Self {
        self.max_size_bytes = bytes;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_size_mb(mut self, megabytes: f64) -> Self {
        self.max_size_bytes = (megabytes * 1024.0 * 1024.0).ceil() as u64;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_max_retained(mut self, count: usize) -> Self {
        self.max_retained = count;
        self
    }

    #[must_use = "builder methods return a new value and do not modify the original"]
    pub fn with_header(mut self, enabled: bool) -> Self {
        self.write_header = enabled;
        self
    }
}

/// Append-only log file that rotates by size and prunes old rotations
///
/// Rotated files are named `{stem}-{stamp}.log` next to the active file,
/// where the stamp is ISO 8601 with `:` and `.` replaced by `-`.
///
/// # Examples
///
/// ```no_run
/// use rust_app_logger::appenders::{RotatingFileStore, StoreOptions};
///
/// let mut store = RotatingFileStore::open(
///     "/var/log/app.log",
///     StoreOptions::new().with_max_size_mb(5.0).with_max_retained(3),
/// ).unwrap();
/// store.append(b"service started\n").unwrap();
/// store.close().unwrap();
/// ```
pub struct RotatingFileStore {
    path: PathBuf,
    options: StoreOptions,
    file: Option<File>,
    current_size: u64,
    /// Bytes of session header at the start of a fresh file
    header_size: u64,
    /// Size at which the next rotation is attempted
    rotate_at: u64,
    /// Rotated files, oldest first
    retained: VecDeque<PathBuf>,
    closed: bool,
    metrics: Arc<LoggerMetrics>,
    on_error: ErrorCallback,
}

impl RotatingFileStore {
    /// Open (or create) the log file at `path`
    ///
    /// # Errors
    ///
    /// Returns error if the directory or file cannot be created or opened
    pub fn open<P: AsRef<Path>>(path: P, options: StoreOptions) -> Result<Self> {
        Self::open_with(path, options, Arc::new(LoggerMetrics::new()), stderr_reporter())
    }

    /// Open with shared metrics and an error sink for non-fatal failures
    pub fn open_with<P: AsRef<Path>>(
        path: P,
        options: StoreOptions,
        metrics: Arc<LoggerMetrics>,
        on_error: ErrorCallback,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                LoggerError::io_operation(
                    "create log directory",
                    format!("Failed to create directory '{}'", parent.display()),
                    e,
                )
            })?;
        }

        let (file, current_size) = open_append(&path)?;
        let retained = scan_rotated(&path);

        let mut store = Self {
            rotate_at: options.max_size_bytes,
            path,
            options,
            file: Some(file),
            current_size,
            header_size: 0,
            retained,
            closed: false,
            metrics,
            on_error,
        };

        // siblings left over from earlier runs count against the limit
        store.enforce_retention();

        if store.options.write_header {
            store.write_header()?;
        }

        Ok(store)
    }

    /// Append bytes, rotating first if the size threshold was reached
    ///
    /// A failed rotation is reported and the bytes go to the current file.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if self.closed {
            return Err(LoggerError::LoggerStopped);
        }

        if let Err(e) = self.rotate_if_needed() {
            (self.on_error)(&e);
        }

        if self.file.is_none() {
            let (file, size) = open_append(&self.path)?;
            self.file = Some(file);
            self.current_size = size;
        }

        let Some(file) = self.file.as_mut() else {
            return Err(LoggerError::file_appender(self.path_str(), "file is not open"));
        };

        if let Err(e) = file.write_all(bytes) {
            // a partial write leaves the cache stale; re-seed it from disk
            if let Ok(meta) = fs::metadata(&self.path) {
                self.current_size = meta.len();
            }
            return Err(LoggerError::file_appender(
                self.path_str(),
                format!("Failed to write log data: {}", e),
            ));
        }

        self.current_size += bytes.len() as u64;
        Ok(())
    }

    /// Rotate when the cached size has reached the threshold
    ///
    /// Returns whether a rotation happened. A file holding nothing but its
    /// session header is never rotated.
    pub fn rotate_if_needed(&mut self) -> Result<bool> {
        if self.current_size < self.rotate_at || self.current_size <= self.header_size {
            return Ok(false);
        }
        self.rotate()?;
        Ok(true)
    }

    fn rotate(&mut self) -> Result<()> {
        // Release the handle before renaming
        if let Some(mut file) = self.file.take() {
            let _ = file.flush();
        }

        let target = self.rotated_path();
        if let Err(e) = fs::rename(&self.path, &target) {
            let (file, size) = open_append(&self.path)?;
            self.file = Some(file);
            self.current_size = size;
            // retry only after another full file's worth of data
            self.rotate_at = size.saturating_add(self.options.max_size_bytes);
            return Err(LoggerError::file_rotation(
                self.path_str(),
                format!("Failed to rename to '{}': {}", target.display(), e),
            ));
        }

        self.retained.push_back(target);
        self.metrics.record_rotation();
        self.current_size = 0;
        self.header_size = 0;
        self.rotate_at = self.options.max_size_bytes;

        let (file, _) = match open_append(&self.path) {
            Ok(opened) => opened,
            Err(e) => {
                // append() retries the open; the rotated file is already tracked
                self.enforce_retention();
                return Err(LoggerError::file_rotation(
                    self.path_str(),
                    format!("Failed to create new log file: {}", e),
                ));
            }
        };
        self.file = Some(file);

        if self.options.write_header {
            if let Err(e) = self.write_header() {
                (self.on_error)(&e);
            }
        }

        self.enforce_retention();
        Ok(())
    }

    /// Delete the oldest rotated files beyond `max_retained`
    ///
    /// A failed delete is reported and the loop goes on with the next
    /// excess file. Returns the number of files removed.
    pub fn enforce_retention(&mut self) -> usize {
        let mut deleted = 0;

        while self.retained.len() > self.options.max_retained {
            let Some(oldest) = self.retained.pop_front() else {
                break;
            };

            match fs::remove_file(&oldest) {
                Ok(()) => {
                    deleted += 1;
                    self.metrics.record_pruned();
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => {
                    (self.on_error)(&LoggerError::retention(
                        oldest.display().to_string(),
                        e.to_string(),
                    ));
                }
            }
        }

        deleted
    }

    /// Write the session separator; it counts toward the file size
    pub fn write_header(&mut self) -> Result<()> {
        let header = session_header();
        let fresh = self.current_size == 0;

        let Some(file) = self.file.as_mut() else {
            return Err(LoggerError::file_appender(self.path_str(), "file is not open"));
        };
        file.write_all(header.as_bytes()).map_err(|e| {
            LoggerError::file_appender(
                self.path.display().to_string(),
                format!("Failed to write session header: {}", e),
            )
        })?;

        let len = header.len() as u64;
        self.current_size += len;
        if fresh {
            self.header_size = len;
        }
        Ok(())
    }

    /// Flush and release the file handle; later calls are no-ops
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        if let Some(mut file) = self.file.take() {
            file.flush().map_err(|e| {
                LoggerError::file_appender(self.path_str(), format!("Failed to flush: {}", e))
            })?;
        }
        Ok(())
    }

    /// Next free rotated name; disambiguated when rotations share a stamp
    fn rotated_path(&self) -> PathBuf {
        let dir = parent_dir(&self.path);
        let stem = file_stem(&self.path);
        let stamp = rotation_stamp(&Utc::now());

        let mut candidate = dir.join(format!("{}-{}.log", stem, stamp));
        let mut n = 1;
        while candidate.exists() || self.retained.contains(&candidate) {
            candidate = dir.join(format!("{}-{}-{}.log", stem, stamp, n));
            n += 1;
        }
        candidate
    }

    fn path_str(&self) -> String {
        self.path.display().to_string()
    }

    /// Cached size of the active file in bytes
    #[must_use]
    pub fn current_size(&self) -> u64 {
        self.current_size
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// Rotated files still on disk, oldest first
    pub fn retained_files(&self) -> impl Iterator<Item = &Path> {
        self.retained.iter().map(PathBuf::as_path)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Appender for RotatingFileStore {
    fn append(&mut self, bytes: &[u8]) -> Result<()> {
        RotatingFileStore::append(self, bytes)
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(ref mut file) = self.file {
            file.flush().map_err(|e| {
                LoggerError::file_appender(
                    self.path.display().to_string(),
                    format!("Failed to flush: {}", e),
                )
            })?;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        RotatingFileStore::close(self)
    }

    fn name(&self) -> &str {
        "rotating_file"
    }
}

impl Drop for RotatingFileStore {
    fn drop(&mut self) {
        let _ = RotatingFileStore::close(self);
    }
}

fn open_append(path: &Path) -> Result<(File, u64)> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| {
            LoggerError::file_appender(path.display().to_string(), format!("Failed to open: {}", e))
        })?;
    let size = file
        .metadata()
        .map_err(|e| {
            LoggerError::file_appender(
                path.display().to_string(),
                format!("Cannot access file metadata: {}", e),
            )
        })?
        .len();
    Ok((file, size))
}

fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "app".to_string())
}

fn session_header() -> String {
    let program = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.file_name().map(|n| n.to_string_lossy().into_owned()))
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "=== session started {} | {} (pid {}) ===\n",
        TimestampFormat::Iso8601.now(),
        program,
        std::process::id()
    )
}

/// Order key for a rotated file name suffix: the stamp, then the
/// disambiguation counter (`0` when absent).
fn rotation_key(suffix: &str) -> Option<(DateTime<Utc>, u32)> {
    if suffix.len() < STAMP_LEN || !suffix.is_char_boundary(STAMP_LEN) {
        return None;
    }
    let (stamp, rest) = suffix.split_at(STAMP_LEN);
    let at = parse_rotation_stamp(stamp)?;
    match rest.strip_prefix('-') {
        None if rest.is_empty() => Some((at, 0)),
        Some(counter) => counter.parse().ok().map(|n| (at, n)),
        None => None,
    }
}

/// One-time scan for rotated siblings of `path`, oldest first
fn scan_rotated(path: &Path) -> VecDeque<PathBuf> {
    let dir = parent_dir(path);
    let prefix = format!("{}-", file_stem(path));

    let Ok(entries) = fs::read_dir(&dir) else {
        return VecDeque::new();
    };

    let mut found: Vec<(DateTime<Utc>, u32, PathBuf)> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            if !entry.file_type().ok()?.is_file() {
                return None;
            }
            let name = entry.file_name().to_str()?.to_string();
            let suffix = name.strip_prefix(&prefix)?.strip_suffix(".log")?;
            let (at, counter) = rotation_key(suffix)?;
            Some((at, counter, entry.path()))
        })
        .collect();

    found.sort();
    found.into_iter().map(|(_, _, path)| path).collect()
}
