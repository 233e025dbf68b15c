//! In-memory storage backend for testing.
//!
//! Stores every blob in a `BTreeMap` behind a `RwLock`. Nothing is persisted.
//! Use this for unit tests that need a real [`BlobStore`] without touching
//! disk.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::{BlobEntry, BlobStore, StorageError, validate_name};

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    modified: DateTime<Utc>,
}

/// An in-memory blob store backed by a `BTreeMap`.
///
/// Listing order is lexicographic by name. Clones share the same data.
///
/// # Examples
///
/// ```
/// # use hermes_storage::{BlobStore, MemoryBlobStore};
/// # #[tokio::main]
/// # async fn main() {
/// let store = MemoryBlobStore::new();
/// store.put("notes.txt", b"data").await.unwrap();
/// assert_eq!(store.get("notes.txt").await.unwrap(), Some(b"data".to_vec()));
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    data: Arc<RwLock<BTreeMap<String, StoredBlob>>>,
}

impl MemoryBlobStore {
    /// Create a new empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError> {
        validate_name(name)?;
        let data = self.data.read().await;
        Ok(data.get(name).map(|blob| blob.bytes.clone()))
    }

    async fn put(&self, name: &str, value: &[u8]) -> Result<(), StorageError> {
        validate_name(name)?;
        let mut data = self.data.write().await;
        data.insert(
            name.to_owned(),
            StoredBlob {
                bytes: value.to_vec(),
                modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        validate_name(name)?;
        let mut data = self.data.write().await;
        data.remove(name);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<BlobEntry>, StorageError> {
        let data = self.data.read().await;
        Ok(data
            .iter()
            .map(|(name, blob)| BlobEntry {
                name: name.clone(),
                size: blob.bytes.len() as u64,
                modified: Some(blob.modified),
            })
            .collect())
    }

    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        validate_name(name)?;
        let data = self.data.read().await;
        Ok(data.contains_key(name))
    }
}
