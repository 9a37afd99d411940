//! Object identifiers for stored documents.
//!
//! Ids are 24 lowercase hexadecimal characters, the shape clients already
//! expect from document databases.

use std::fmt;

use uuid::Uuid;

use super::errors::{StoreError, StoreResult};

/// Length of an id in hex characters
pub const OBJECT_ID_LEN: usize = 24;

/// A validated document id
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(String);

impl ObjectId {
    /// Generate a fresh random id
    pub fn new() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(hex[..OBJECT_ID_LEN].to_string())
    }

    /// Parse an id supplied by a client
    pub fn parse(value: &str) -> StoreResult<Self> {
        if value.len() == OBJECT_ID_LEN && value.bytes().all(|b| b.is_ascii_hexdigit()) {
            Ok(Self(value.to_ascii_lowercase()))
        } else {
            Err(StoreError::InvalidId(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
