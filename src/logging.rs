//! Tracing subscriber setup
//!
//! ```text
//! Registry
//!   ├── EnvFilter (RUST_LOG, else the configured level)
//!   └── Fmt Layer (json | pretty | compact)
//! ```

use crate::config::LoggingConfig;
use thiserror::Error;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Errors that can occur while installing the subscriber
#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log filter '{0}': {1}")]
    InvalidFilter(String, String),

    #[error("Unknown log format '{0}'")]
    UnknownFormat(String),

    #[error("Failed to set global subscriber (may already be initialized): {0}")]
    AlreadyInitialized(String),
}

/// Build the filter: `RUST_LOG` when set, otherwise `level`
pub fn env_filter(level: &str) -> Result<EnvFilter, LoggingError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(level)
            .map_err(|e| LoggingError::InvalidFilter(level.to_string(), e.to_string())),
    }
}

/// Install the global subscriber for the process
pub fn init_subscriber(config: &LoggingConfig) -> Result<(), LoggingError> {
    let filter = env_filter(&config.level)?;
    let registry = tracing_subscriber::registry().with(filter);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let result = match config.format.as_str() {
        "json" => registry
            .with(fmt_layer.json().flatten_event(true).with_current_span(true))
            .try_init(),
        "pretty" => registry.with(fmt_layer.pretty()).try_init(),
        "compact" => registry.with(fmt_layer.compact()).try_init(),
        other => return Err(LoggingError::UnknownFormat(other.to_string())),
    };

    result.map_err(|e| LoggingError::AlreadyInitialized(e.to_string()))
}
