//! # Store Errors
//!
//! Error types for the document store.

use std::path::PathBuf;

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Document store errors
#[derive(Debug, Error)]
pub enum StoreError {
    /// The query document, sort or projection could not be interpreted
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// A value that must be an object id is malformed
    #[error("Invalid _id: {0}")]
    InvalidId(String),

    /// A unique index rejected a write
    #[error("Duplicate key error: {field} = {value}")]
    DuplicateKey { field: String, value: String },

    /// The database handle was closed
    #[error("Database is closed")]
    Closed,

    /// Reading or writing a collection file failed
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A collection file does not contain a JSON array of documents
    #[error("Corrupt collection file {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn invalid_query(msg: impl Into<String>) -> Self {
        StoreError::InvalidQuery(msg.into())
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the error was caused by the caller rather than the store itself
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            StoreError::InvalidQuery(_) | StoreError::InvalidId(_) | StoreError::DuplicateKey { .. }
        )
    }
}
