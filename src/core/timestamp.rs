//! Record and file-name timestamps
//!
//! Record prefixes follow the configured [`TimestampFormat`]. Rotated file
//! names always carry a filesystem-safe UTC stamp that sorts
//! chronologically as plain text.

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;

const ISO_MILLIS: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";
const STAMP_PATTERN: &str = "%Y-%m-%dT%H-%M-%S-%3fZ";

/// How record timestamps are rendered
///
/// In configuration files: `"iso8601"`, `"local"`, `"time-only"`,
/// `"unix-millis"` or `{ "custom": "%H:%M" }`.
///
/// # Examples
///
/// ```
/// use rust_app_logger::core::TimestampFormat;
/// use chrono::Utc;
///
/// let stamp = TimestampFormat::Iso8601.format(&Utc::now());
/// assert!(stamp.ends_with('Z'));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampFormat {
    /// `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,
    /// Local wall clock, `2025-01-08 11:30:45.123`
    Local,
    /// Local time of day, `11:30:45.123`
    TimeOnly,
    /// Milliseconds since the epoch
    UnixMillis,
    /// strftime pattern rendered in UTC
    Custom(String),
}

impl TimestampFormat {
    #[must_use]
    pub fn format(&self, at: &DateTime<Utc>) -> String {
        match self {
            TimestampFormat::Iso8601 => at.format(ISO_MILLIS).to_string(),
            TimestampFormat::Local => at
                .with_timezone(&Local)
                .format("%Y-%m-%d %H:%M:%S%.3f")
                .to_string(),
            TimestampFormat::TimeOnly => at.with_timezone(&Local).format("%H:%M:%S%.3f").to_string(),
            TimestampFormat::UnixMillis => at.timestamp_millis().to_string(),
            TimestampFormat::Custom(pattern) => {
                let mut out = String::new();
                if write!(out, "{}", at.format(pattern)).is_err() {
                    return TimestampFormat::Iso8601.format(at);
                }
                out
            }
        }
    }

    /// Reject custom patterns chrono cannot render
    pub fn check(&self) -> Result<(), String> {
        match self {
            TimestampFormat::Custom(pattern) => {
                if StrftimeItems::new(pattern).any(|item| matches!(item, Item::Error)) {
                    Err(format!("invalid strftime pattern '{}'", pattern))
                } else {
                    Ok(())
                }
            }
            _ => Ok(()),
        }
    }

    #[must_use]
    pub fn now(&self) -> String {
        self.format(&Utc::now())
    }
}

/// UTC stamp for rotated names: `2025-01-08T10-30-45-123Z`
#[must_use]
pub fn rotation_stamp(at: &DateTime<Utc>) -> String {
    at.format(STAMP_PATTERN).to_string()
}

/// Inverse of [`rotation_stamp`]; `None` for anything it would not produce
#[must_use]
pub fn parse_rotation_stamp(stamp: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(stamp, STAMP_PATTERN)
        .ok()
        .map(|naive| naive.and_utc())
}
