//! Process-wide tracing setup.
//!
//! The subscriber is initialised once at startup: a console layer always, and
//! an additional plain-text file layer when `--log-file` is given. The level
//! comes from `--log-level` and accepts any `tracing` filter directive.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default filter when no level is requested.
const DEFAULT_LEVEL: &str = "info";

/// Errors raised while initialising logging.
#[derive(Debug, Error)]
pub enum LoggingError {
    /// The requested level did not parse as a filter directive.
    #[error("invalid log level {level}: {message}")]
    Level {
        /// Level string passed on the command line.
        level: String,
        /// Parser error message.
        message: String,
    },
    /// The log file could not be opened for appending.
    #[error("failed to open log file {path}: {source}")]
    File {
        /// Path passed on the command line.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// A global subscriber was already installed.
    #[error("failed to install tracing subscriber: {0}")]
    Init(String),
}

/// Installs the global subscriber.
///
/// # Errors
///
/// Returns [`LoggingError`] when the level fails to parse, the log file
/// cannot be opened, or a subscriber is already installed.
pub fn init(level: Option<&str>, log_file: Option<&Path>) -> Result<(), LoggingError> {
    let directive = level.unwrap_or(DEFAULT_LEVEL).to_lowercase();
    let filter = EnvFilter::try_new(&directive).map_err(|err| LoggingError::Level {
        level: directive.clone(),
        message: err.to_string(),
    })?;

    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|source| LoggingError::File {
                    path: path.display().to_string(),
                    source,
                })?;
            Some(fmt::layer().with_ansi(false).with_writer(Arc::new(file)))
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .try_init()
        .map_err(|err| LoggingError::Init(err.to_string()))
}
