//! Process-wide named loggers
//!
//! The first registration of a name wins. Asking for an existing name with
//! a different configuration returns the existing logger and prints a
//! warning; it never reconfigures a live logger.

use super::config::LoggerConfig;
use super::error::Result;
use super::logger::{Logger, LoggerBuilder};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

static REGISTRY: OnceLock<Mutex<HashMap<String, Arc<Logger>>>> = OnceLock::new();

fn registry() -> &'static Mutex<HashMap<String, Arc<Logger>>> {
    REGISTRY.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Return the logger registered as `name`, building it from `config` first
/// if there is none
///
/// # Examples
///
/// ```
/// use rust_app_logger::core::{registry, LoggerConfig};
///
/// let config = LoggerConfig { enable_console: false, ..LoggerConfig::default() };
/// let first = registry::get_or_create("docs", config.clone()).unwrap();
/// let again = registry::get_or_create("docs", config).unwrap();
/// assert!(std::sync::Arc::ptr_eq(&first, &again));
/// # registry::remove("docs");
/// ```
pub fn get_or_create(name: &str, config: LoggerConfig) -> Result<Arc<Logger>> {
    let mut loggers = registry().lock();

    if let Some(existing) = loggers.get(name) {
        if *existing.config() != config {
            eprintln!(
                "[LOGGER WARNING] Logger '{}' already exists; ignoring the new configuration",
                name
            );
        }
        return Ok(Arc::clone(existing));
    }

    let logger = LoggerBuilder::new().config(config).build_shared()?;
    loggers.insert(name.to_string(), Arc::clone(&logger));
    Ok(logger)
}

pub fn get(name: &str) -> Option<Arc<Logger>> {
    registry().lock().get(name).cloned()
}

/// Unregister `name`; the logger closes once its last handle is dropped
pub fn remove(name: &str) -> Option<Arc<Logger>> {
    registry().lock().remove(name)
}

pub fn names() -> Vec<String> {
    registry().lock().keys().cloned().collect()
}
