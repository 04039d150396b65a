//! Custom log levels
//!
//! Extra levels are injected into the builder instead of being mixed into
//! the logger type. Each one maps onto a built-in severity for filtering and
//! carries its own label, color and optional message transform.

use super::log_level::LogLevel;
use colored::Color;
use std::fmt;
use std::sync::Arc;

pub type MessageFormatter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// # Examples
///
/// ```
/// use rust_app_logger::core::{CustomLevel, LogLevel};
/// use colored::Color;
///
/// let audit = CustomLevel::new("audit", LogLevel::Warn)
///     .with_color(Color::Magenta)
///     .with_formatter(|msg| format!("AUDIT {}", msg));
///
/// assert_eq!(audit.label(), "AUDIT");
/// assert_eq!(audit.format_message("user deleted"), "AUDIT user deleted");
/// ```
#[derive(Clone)]
pub struct CustomLevel {
    name: String,
    level: LogLevel,
    color: Color,
    formatter: Option<MessageFormatter>,
}

impl CustomLevel {
    pub fn new(name: impl Into<String>, level: LogLevel) -> Self {
        Self {
            name: name.into(),
            level,
            color: level.color_code(),
            formatter: None,
        }
    }

    #[must_use]
    pub fn with_color(mut self, color: Color) -> Self {
        self.color = color;
        self
    }

    #[must_use]
    pub fn with_formatter<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&str) -> String + Send + Sync + 'static,
    {
        self.formatter = Some(Arc::new(formatter));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label shown in the record, the upper-cased name
    pub fn label(&self) -> String {
        self.name.to_uppercase()
    }

    pub fn level(&self) -> LogLevel {
        self.level
    }

    pub fn color(&self) -> Color {
        self.color
    }

    pub fn format_message(&self, message: &str) -> String {
        match self.formatter {
            Some(ref formatter) => formatter(message),
            None => message.to_string(),
        }
    }
}

impl fmt::Debug for CustomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomLevel")
            .field("name", &self.name)
            .field("level", &self.level)
            .field("color", &self.color)
            .field("formatter", &self.formatter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_level() {
        let notice = CustomLevel::new("notice", LogLevel::Info);
        assert_eq!(notice.name(), "notice");
        assert_eq!(notice.label(), "NOTICE");
        assert_eq!(notice.color(), LogLevel::Info.color_code());
        assert_eq!(notice.format_message("as is"), "as is");
    }
}
