//! Console sink
//!
//! Console output is synchronous and independent of file delivery: a broken
//! file store never silences the terminal.

use crate::core::{LogLevel, LogRecord, Result};
use parking_lot::Mutex;
use std::io::Write;

pub struct ConsoleSink {
    use_colors: bool,
    /// Replaces stdout/stderr when set, mostly for capturing output
    writer: Option<Mutex<Box<dyn Write + Send>>>,
}

impl ConsoleSink {
    pub fn new(use_colors: bool) -> Self {
        Self {
            use_colors,
            writer: None,
        }
    }

    /// Send every line to `writer` instead of the standard streams
    ///
    /// # Examples
    ///
    /// ```
    /// use rust_app_logger::appenders::ConsoleSink;
    /// use rust_app_logger::{LogLevel, LogRecord};
    ///
    /// let sink = ConsoleSink::with_writer(false, Box::new(std::io::sink()));
    /// sink.write_record(&LogRecord::new(LogLevel::Info, "ready")).unwrap();
    /// ```
    pub fn with_writer(use_colors: bool, writer: Box<dyn Write + Send>) -> Self {
        Self {
            use_colors,
            writer: Some(Mutex::new(writer)),
        }
    }

    pub fn use_colors(&self) -> bool {
        self.use_colors
    }

    pub fn write_record(&self, record: &LogRecord) -> Result<()> {
        let line = if self.use_colors {
            record.render_colored()
        } else {
            record.render_plain()
        };
        self.emit(record.level, &line)
    }

    /// Write a preformatted block (the call-count report) to stdout
    pub fn write_text(&self, text: &str) -> Result<()> {
        self.emit(LogLevel::Info, text)
    }

    fn emit(&self, level: LogLevel, line: &str) -> Result<()> {
        if let Some(ref writer) = self.writer {
            writeln!(writer.lock(), "{}", line)?;
            return Ok(());
        }

        // Route Error and Fatal levels to stderr, others to stdout
        match level {
            LogLevel::Error | LogLevel::Fatal => {
                writeln!(std::io::stderr().lock(), "{}", line)?;
            }
            _ => {
                writeln!(std::io::stdout().lock(), "{}", line)?;
            }
        }
        Ok(())
    }

    pub fn flush(&self) -> Result<()> {
        if let Some(ref writer) = self.writer {
            writer.lock().flush()?;
            return Ok(());
        }
        // Flush both stdout and stderr since we write to both
        std::io::stdout().flush()?;
        std::io::stderr().flush()?;
        Ok(())
    }
}

impl Default for ConsoleSink {
    fn default() -> Self {
        Self::new(true)
    }
}
