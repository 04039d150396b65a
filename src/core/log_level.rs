//! Log level definitions

use colored::Color;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Severity of a record, 0 (most verbose) through 5 (most severe)
///
/// Configuration files carry levels as plain integers, so serde goes
/// through `u8`.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(try_from = "u8", into = "u8")]
pub enum LogLevel {
    Trace = 0,
    Debug = 1,
    #[default]
    Info = 2,
    Warn = 3,
    Error = 4,
    Fatal = 5,
}

impl LogLevel {
    pub const ALL: [LogLevel; 6] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
        LogLevel::Fatal,
    ];

    pub fn to_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
            LogLevel::Fatal => "FATAL",
        }
    }

    pub fn color_code(&self) -> Color {
        match self {
            LogLevel::Trace => Color::BrightBlack,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
            LogLevel::Fatal => Color::BrightRed,
        }
    }

    /// Whether a record at this level reaches a sink with `threshold`
    #[inline]
    pub fn passes(self, threshold: LogLevel) -> bool {
        self >= threshold
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str())
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "TRACE" => Ok(LogLevel::Trace),
            "DEBUG" => Ok(LogLevel::Debug),
            "INFO" => Ok(LogLevel::Info),
            "WARN" | "WARNING" => Ok(LogLevel::Warn),
            "ERROR" => Ok(LogLevel::Error),
            "FATAL" => Ok(LogLevel::Fatal),
            other => other
                .parse::<u8>()
                .map_err(|_| format!("Invalid log level: '{}'", s))
                .and_then(LogLevel::try_from),
        }
    }
}

impl TryFrom<u8> for LogLevel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, String> {
        LogLevel::ALL
            .get(usize::from(value))
            .copied()
            .ok_or_else(|| format!("Invalid log level: {} (expected 0-5)", value))
    }
}

impl From<LogLevel> for u8 {
    fn from(level: LogLevel) -> Self {
        level as u8
    }
}

/// The delivery gate shared by console and file sinks.
///
/// A record goes through iff its level reaches the sink threshold and the
/// caller-supplied condition is not explicitly `false`.
#[inline]
pub fn should_deliver(level: LogLevel, threshold: LogLevel, condition: Option<bool>) -> bool {
    condition != Some(false) && level.passes(threshold)
}
