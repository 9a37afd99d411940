//! # Database Handle
//!
//! The explicit connection to the document store. It is opened once at
//! startup, handed to whatever needs collections, and closed at shutdown.
//! After `close` every collection handle obtained from it fails with
//! [`StoreError::Closed`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use super::collection::Collection;
use super::errors::{StoreError, StoreResult};

/// Store configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Directory for collection files; `None` keeps everything in memory
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
}

impl StoreConfig {
    pub fn in_memory() -> Self {
        Self { data_dir: None }
    }

    pub fn on_disk(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: Some(data_dir.into()),
        }
    }
}

#[derive(Debug)]
struct DatabaseInner {
    data_dir: Option<PathBuf>,
    collections: Mutex<HashMap<String, Collection>>,
    closed: Arc<AtomicBool>,
}

/// Shared database handle. Cloning is cheap.
#[derive(Debug, Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Open the database, creating the data directory if needed
    pub async fn open(config: &StoreConfig) -> StoreResult<Self> {
        if let Some(dir) = &config.data_dir {
            tokio::fs::create_dir_all(dir)
                .await
                .map_err(|e| StoreError::io(dir, e))?;
        }

        tracing::info!(
            data_dir = ?config.data_dir,
            "database opened"
        );

        Ok(Self {
            inner: Arc::new(DatabaseInner {
                data_dir: config.data_dir.clone(),
                collections: Mutex::new(HashMap::new()),
                closed: Arc::new(AtomicBool::new(false)),
            }),
        })
    }

    /// Open an in-memory database
    pub async fn in_memory() -> StoreResult<Self> {
        Self::open(&StoreConfig::in_memory()).await
    }

    pub fn data_dir(&self) -> Option<&Path> {
        self.inner.data_dir.as_deref()
    }

    pub fn is_open(&self) -> bool {
        !self.inner.closed.load(Ordering::Acquire)
    }

    /// Get a collection by name, loading it on first use
    pub async fn collection(&self, name: &str) -> StoreResult<Collection> {
        if !self.is_open() {
            return Err(StoreError::Closed);
        }
        validate_collection_name(name)?;

        let mut collections = self.inner.collections.lock().await;
        if let Some(existing) = collections.get(name) {
            return Ok(existing.clone());
        }

        let path = self
            .inner
            .data_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", name)));
        let collection = Collection::load(name, path, self.inner.closed.clone()).await?;
        collections.insert(name.to_string(), collection.clone());

        Ok(collection)
    }

    /// Flush every loaded collection and close the handle. Closing twice is a no-op.
    pub async fn close(&self) -> StoreResult<()> {
        let collections = self.inner.collections.lock().await;
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        for collection in collections.values() {
            collection.flush().await?;
        }

        tracing::info!(collections = collections.len(), "database closed");
        Ok(())
    }
}

fn validate_collection_name(name: &str) -> StoreResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');

    if valid {
        Ok(())
    } else {
        Err(StoreError::invalid_query(format!(
            "Invalid collection name: {}",
            name
        )))
    }
}
