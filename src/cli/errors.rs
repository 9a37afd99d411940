//! CLI-specific error types
//!
//! Every CLI error ends the process with a non-zero exit code.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::ConfigError;
use crate::model::ModelError;
use crate::store::StoreError;

/// CLI error
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid seed data in {path}: {reason}")]
    InvalidData { path: PathBuf, reason: String },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("Failed to create tokio runtime: {0}")]
    Runtime(#[source] io::Error),

    #[error("HTTP server failed: {0}")]
    Server(#[source] io::Error),
}

impl CliError {
    /// Get the error code string
    pub fn code(&self) -> &'static str {
        match self {
            CliError::Config(_) => "TOURS_CLI_CONFIG_ERROR",
            CliError::Read { .. } | CliError::InvalidData { .. } => "TOURS_CLI_IO_ERROR",
            CliError::Store(_) => "TOURS_CLI_STORE_ERROR",
            CliError::Model(_) => "TOURS_CLI_DATA_ERROR",
            CliError::Runtime(_) | CliError::Server(_) => "TOURS_CLI_BOOT_FAILED",
        }
    }
}

/// CLI result type
pub type CliResult<T> = Result<T, CliError>;
