//! Shared logging setup for the dbexport binary.
//!
//! The pipeline itself only emits `tracing` events; installing a subscriber
//! is left to the binary so tests can observe runs without global state.

use crate::{Result, error::DbExportError};
use std::{fs::OpenOptions, path::Path, sync::Mutex};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Maps CLI verbosity flags to a maximum log level.
///
/// `quiet` wins over any number of `-v` flags.
pub const fn level_for(verbose: u8, quiet: bool) -> tracing::Level {
    match (quiet, verbose) {
        (true, _) => tracing::Level::ERROR,
        (false, 0) => tracing::Level::INFO,
        (false, 1) => tracing::Level::DEBUG,
        (false, _) => tracing::Level::TRACE,
    }
}

/// Initializes structured logging based on verbosity level.
///
/// Console output goes to stderr so that stdout stays reserved for the run
/// summary. When `log_file` is given, the same events are appended to that
/// file without ANSI colors; its parent directory is created if missing.
/// `RUST_LOG`, when set, replaces the level derived from the flags.
///
/// # Example
/// ```rust,no_run
/// use dbexport_core::logging::init_logging;
///
/// init_logging(1, false, None).expect("Failed to initialize logging");
/// ```
///
/// # Errors
/// Returns a configuration error if the log file cannot be opened or a
/// global subscriber is already installed.
pub fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> Result<()> {
    let level = level_for(verbose, quiet);
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.as_str().to_lowercase()));

    let file_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DbExportError::configuration(format!(
                        "Failed to create log directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    DbExportError::configuration(format!(
                        "Failed to open log file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_file(false)
                .with_line_number(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| {
            DbExportError::configuration(format!("Failed to initialize logging: {}", e))
        })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    // Logging can only be initialized once per test process, so only the
    // level mapping is exercised here.
    use super::level_for;

    #[test]
    fn test_verbosity_levels() {
        let test_cases = [
            ((true, 0), tracing::Level::ERROR),
            ((true, 5), tracing::Level::ERROR),
            ((false, 0), tracing::Level::INFO),
            ((false, 1), tracing::Level::DEBUG),
            ((false, 2), tracing::Level::TRACE),
            ((false, 10), tracing::Level::TRACE),
        ];

        for ((quiet, verbose), expected) in test_cases {
            assert_eq!(
                level_for(verbose, quiet),
                expected,
                "Failed for quiet={}, verbose={}",
                quiet,
                verbose
            );
        }
    }
}
