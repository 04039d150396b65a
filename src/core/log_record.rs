//! Log record structure
//!
//! A record is rendered twice: a colorized variant for the console and a
//! plain variant for files. Both are built from the same pieces, so the
//! plain text is always the colorized text with its escape codes removed.

use super::log_level::LogLevel;
use colored::{Color, Colorize};
use std::panic::Location;

#[derive(Debug, Clone)]
pub struct LogRecord {
    pub level: LogLevel,
    /// Display label, `INFO` for built-in levels or the custom level name
    pub label: String,
    pub color: Color,
    pub message: String,
    pub timestamp: Option<String>,
    pub memory_usage: Option<String>,
    pub inline_caller_info: Option<String>,
    pub caller_info: Option<String>,
    pub stack_trace: Option<String>,
}

impl LogRecord {
    /// Sanitize log message to prevent log injection attacks
    ///
    /// Replaces newlines, carriage returns, and tabs with escape sequences
    /// so one record always occupies one line of the file.
    fn sanitize_message(message: &str) -> String {
        message
            .replace('\n', "\\n")
            .replace('\r', "\\r")
            .replace('\t', "\\t")
    }

    pub fn new(level: LogLevel, message: impl AsRef<str>) -> Self {
        Self {
            level,
            label: level.to_str().to_string(),
            color: level.color_code(),
            message: Self::sanitize_message(message.as_ref()),
            timestamp: None,
            memory_usage: None,
            inline_caller_info: None,
            caller_info: None,
            stack_trace: None,
        }
    }

    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>, color: Color) -> Self {
        self.label = label.into();
        self.color = color;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, timestamp: String) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    #[must_use]
    pub fn with_memory_usage(mut self, memory: String) -> Self {
        self.memory_usage = Some(memory);
        self
    }

    /// Short `file:line` shown before the message
    #[must_use]
    pub fn with_inline_caller(mut self, location: &Location<'_>) -> Self {
        let file = location
            .file()
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or(location.file());
        self.inline_caller_info = Some(format!("{}:{}", file, location.line()));
        self
    }

    /// Full `file:line:column` shown after the message
    #[must_use]
    pub fn with_caller(mut self, location: &Location<'_>) -> Self {
        self.caller_info = Some(format!(
            "{}:{}:{}",
            location.file(),
            location.line(),
            location.column()
        ));
        self
    }

    #[must_use]
    pub fn with_stack_trace(mut self, trace: String) -> Self {
        self.stack_trace = Some(trace);
        self
    }

    /// Plain rendering, the only variant ever written to files
    pub fn render_plain(&self) -> String {
        self.render(false)
    }

    /// Colorized rendering for terminals
    pub fn render_colored(&self) -> String {
        self.render(true)
    }

    fn render(&self, colors: bool) -> String {
        let mut out = String::with_capacity(self.message.len() + 64);

        if let Some(ref ts) = self.timestamp {
            let piece = format!("[{}]", ts);
            out.push_str(&paint(piece, colors, |s| s.dimmed().to_string()));
            out.push(' ');
        }

        let label = format!("[{:5}]", self.label);
        out.push_str(&paint(label, colors, |s| {
            s.color(self.color).bold().to_string()
        }));
        out.push(' ');

        if let Some(ref mem) = self.memory_usage {
            let piece = format!("[mem {}]", mem);
            out.push_str(&paint(piece, colors, |s| s.cyan().to_string()));
            out.push(' ');
        }

        if let Some(ref inline) = self.inline_caller_info {
            let piece = format!("[{}]", inline);
            out.push_str(&paint(piece, colors, |s| s.dimmed().to_string()));
            out.push(' ');
        }

        out.push_str(&self.message);

        if let Some(ref caller) = self.caller_info {
            out.push(' ');
            let piece = format!("(at {})", caller);
            out.push_str(&paint(piece, colors, |s| s.dimmed().to_string()));
        }

        if let Some(ref trace) = self.stack_trace {
            out.push('\n');
            out.push_str(trace.trim_end());
        }

        out
    }
}

fn paint(piece: String, colors: bool, style: impl FnOnce(&str) -> String) -> String {
    if colors {
        style(&piece)
    } else {
        piece
    }
}

/// Remove every ANSI escape sequence from `input`, OSC hyperlinks included;
/// line feeds survive
pub fn strip_ansi(input: &str) -> String {
    let bytes = strip_ansi_escapes::strip(input);
    String::from_utf8_lossy(&bytes).into_owned()
}
