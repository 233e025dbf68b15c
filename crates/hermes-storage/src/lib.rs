//! Blob storage abstraction for Hermes.
//!
//! This crate defines the [`BlobStore`] trait: a flat, name-addressed byte
//! store that knows nothing about documents, sidecars or access levels. The
//! metadata layer in `hermes-core` decides which blobs are documents and which
//! are sidecar records.
//!
//! Two implementations are provided:
//!
//! - [`FsBlobStore`]: production default, one flat directory on disk
//! - [`MemoryBlobStore`]: in-memory, for testing only

mod error;
mod fs;
mod memory;

pub use error::StorageError;
pub use fs::FsBlobStore;
pub use memory::MemoryBlobStore;

use chrono::{DateTime, Utc};

/// One stored blob as reported by [`BlobStore::list`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    /// Blob name (a single path component).
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time, when the backend can report it.
    pub modified: Option<DateTime<Utc>>,
}

/// A pluggable blob storage backend.
///
/// Names are single path components (`report.pdf`, `report.pdf.meta`). Values
/// are opaque byte arrays. Every backend must reject names that could escape
/// the store (see [`validate_name`]).
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Retrieve a blob by name.
    ///
    /// Returns `Ok(None)` if the blob does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails, or
    /// [`StorageError::InvalidName`] for an unsafe name.
    async fn get(&self, name: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a blob, overwriting any existing blob of the same name.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the underlying backend fails, or
    /// [`StorageError::InvalidName`] for an unsafe name.
    async fn put(&self, name: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Delete a blob. This is idempotent; deleting a missing blob is not an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the underlying backend fails, or
    /// [`StorageError::InvalidName`] for an unsafe name.
    async fn delete(&self, name: &str) -> Result<(), StorageError>;

    /// List every blob in the store, in backend enumeration order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::List`] if the store cannot be enumerated.
    async fn list(&self) -> Result<Vec<BlobEntry>, StorageError>;

    /// Check whether a blob exists.
    ///
    /// The default implementation calls [`get`](BlobStore::get) and checks
    /// for `Some`. Backends may override this with a cheaper check.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn exists(&self, name: &str) -> Result<bool, StorageError> {
        Ok(self.get(name).await?.is_some())
    }
}

/// Reject names that are not a single, ordinary path component.
///
/// # Errors
///
/// Returns [`StorageError::InvalidName`] for empty names, `.` and `..`, and
/// names containing a path separator or a NUL byte.
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    let reason = if name.is_empty() {
        Some("name is empty")
    } else if name == "." || name == ".." {
        Some("name refers to a directory")
    } else if name.contains('/') || name.contains('\\') {
        Some("name contains a path separator")
    } else if name.contains('\0') {
        Some("name contains a NUL byte")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(StorageError::InvalidName {
            name: name.to_owned(),
            reason: reason.to_owned(),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordinary_names_are_accepted() {
        assert!(validate_name("report.pdf").is_ok());
        assert!(validate_name("Presupuesto Q3 (final).xlsx").is_ok());
        assert!(validate_name(".hidden").is_ok());
    }

    #[test]
    fn traversal_names_are_rejected() {
        for name in ["", ".", "..", "../etc/passwd", "a/b", "a\\b", "nul\0byte"] {
            assert!(
                matches!(validate_name(name), Err(StorageError::InvalidName { .. })),
                "expected '{name:?}' to be rejected"
            );
        }
    }
}
