use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Mutex;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "SETWISE_LOG";

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("cannot open log file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),
    #[error("logging already initialized")]
    AlreadySet,
}

/// `SETWISE_LOG` wins over the configured directive
pub fn env_filter(default_directive: &str) -> Result<EnvFilter, LoggingError> {
    let directive = std::env::var(LOG_ENV)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default_directive.to_string());
    Ok(EnvFilter::try_new(directive)?)
}

/// Install the global subscriber, appending to `path`.
///
/// The terminal belongs to the TUI while it runs, so log lines only ever
/// go to the file.
pub fn init(default_directive: &str, path: &Path) -> Result<(), LoggingError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file: File = OpenOptions::new().create(true).append(true).open(path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(default_directive)?)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|_| LoggingError::AlreadySet)
}
