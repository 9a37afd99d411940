//! Structured logging setup
//!
//! Human-readable output in development, one JSON object per line in
//! production. `RUST_LOG` wins over the configured filter.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::{AppConfig, Environment};

/// Logging setup errors. Never fatal for the caller's data.
#[derive(Debug, Error)]
pub enum ObservabilityError {
    #[error("Invalid log filter '{filter}': {reason}")]
    InvalidFilter { filter: String, reason: String },

    #[error("Failed to install log subscriber: {0}")]
    Install(String),
}

/// Output format of log lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl From<Environment> for LogFormat {
    fn from(env: Environment) -> Self {
        match env {
            Environment::Development => LogFormat::Pretty,
            Environment::Production => LogFormat::Json,
        }
    }
}

/// `RUST_LOG` if set and valid, otherwise `default`
pub fn build_filter(default: &str) -> Result<EnvFilter, ObservabilityError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    EnvFilter::try_new(default).map_err(|e| ObservabilityError::InvalidFilter {
        filter: default.to_string(),
        reason: e.to_string(),
    })
}

/// Install the global subscriber for this process
pub fn init_logging(config: &AppConfig) -> Result<(), ObservabilityError> {
    let filter = build_filter(&config.log_filter)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    let installed = match LogFormat::from(config.environment) {
        LogFormat::Pretty => builder.with_target(false).try_init(),
        LogFormat::Json => builder.json().with_current_span(false).try_init(),
    };

    installed.map_err(|e| ObservabilityError::Install(e.to_string()))
}
