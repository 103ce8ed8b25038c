//! Logging setup.
//!
//! Installs a global `tracing` subscriber with two layers:
//!
//! ```text
//!                 ┌──► file layer ──► non-blocking writer ──► <dir>/cellsweep.log
//! EnvFilter ──────┤
//!                 └──► stderr layer (compact)
//! ```
//!
//! `RUST_LOG` takes precedence over the configured level. The returned
//! [`LoggingGuard`] flushes the file writer on drop and must be held for
//! the lifetime of the process.

use std::fs;
use std::io;
use std::path::PathBuf;

use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::LocalTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Log file name inside the log directory.
pub const LOG_FILE_NAME: &str = "cellsweep.log";

/// Default filter directive.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Logging destination and verbosity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Directory receiving the log file.
    pub directory: PathBuf,
    /// Filter directive, e.g. `info` or `cellsweep=debug`.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let directory = dirs::data_local_dir()
            .map(|dir| dir.join("cellsweep").join("logs"))
            .unwrap_or_else(|| PathBuf::from("logs"));
        Self {
            directory,
            level: DEFAULT_LOG_LEVEL.to_string(),
        }
    }
}

impl LoggingConfig {
    /// Path of the log file.
    pub fn file_path(&self) -> PathBuf {
        self.directory.join(LOG_FILE_NAME)
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The log directory could not be created.
    #[error("failed to create log directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The filter directive could not be parsed.
    #[error("invalid log filter '{directive}': {reason}")]
    Filter { directive: String, reason: String },

    /// A global subscriber is already installed.
    #[error("failed to install subscriber: {0}")]
    Install(String),
}

/// Keeps the background log writer alive.
#[must_use = "dropping the guard stops the file writer"]
pub struct LoggingGuard {
    _file: WorkerGuard,
}

impl std::fmt::Debug for LoggingGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoggingGuard").finish_non_exhaustive()
    }
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Fails if the directory cannot be created, the level is not a valid
/// filter, or a subscriber was already installed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard, LoggingError> {
    fs::create_dir_all(&config.directory).map_err(|source| LoggingError::CreateDir {
        path: config.directory.clone(),
        source,
    })?;

    let filter = build_filter(&config.level)?;

    let appender = tracing_appender::rolling::never(&config.directory, LOG_FILE_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_timer(LocalTime::rfc_3339())
        .with_thread_names(true);

    let stderr_layer = fmt::layer()
        .compact()
        .with_writer(io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .map_err(|e| LoggingError::Install(e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}

/// `RUST_LOG` if set and valid, otherwise the configured directive.
fn build_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| LoggingError::Filter {
        directive: level.to_string(),
        reason: e.to_string(),
    })
}
