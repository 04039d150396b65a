//! Exit-signal handling
//!
//! Opt-in: on SIGINT or SIGTERM the logger is closed, then the process
//! exits with `128 + signal`. The handler thread holds only a weak
//! reference, so it never keeps a logger alive.

use super::error::{LoggerError, Result};
use super::logger::Logger;
use std::sync::Weak;

#[cfg(unix)]
mod imp {
    use super::*;
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::{Handle, Signals};
    use std::thread;

    pub struct ExitHandlerGuard {
        handle: Handle,
    }

    impl ExitHandlerGuard {
        /// Stop listening; the handler thread exits on its own
        pub fn uninstall(&self) {
            self.handle.close();
        }
    }

    impl Drop for ExitHandlerGuard {
        fn drop(&mut self) {
            self.handle.close();
        }
    }

    pub fn install_exit_handlers(logger: Weak<Logger>) -> Result<ExitHandlerGuard> {
        let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
            LoggerError::io_operation("registering exit signal handlers", "signal-hook failed", e)
        })?;
        let handle = signals.handle();

        thread::Builder::new()
            .name("log-exit-signals".to_string())
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    eprintln!(
                        "[LOGGER WARNING] Received signal {}, closing logger before exit",
                        signal
                    );
                    if let Some(logger) = logger.upgrade() {
                        if let Err(e) = logger.close() {
                            eprintln!("[LOGGER ERROR] Failed to close logger on exit: {}", e);
                        }
                    }
                    std::process::exit(128 + signal);
                }
            })
            .map_err(|e| {
                LoggerError::io_operation("spawning exit signal thread", "spawn failed", e)
            })?;

        Ok(ExitHandlerGuard { handle })
    }
}

#[cfg(not(unix))]
mod imp {
    use super::*;

    pub struct ExitHandlerGuard;

    impl ExitHandlerGuard {
        pub fn uninstall(&self) {}
    }

    pub fn install_exit_handlers(_logger: Weak<Logger>) -> Result<ExitHandlerGuard> {
        Err(LoggerError::config(
            "handleExitSignals",
            "exit signal handling is only supported on unix",
        ))
    }
}

pub use imp::{install_exit_handlers, ExitHandlerGuard};
