//! Error types for `hermes-core`.
//!
//! Each error variant carries the document name and a reason so a failure can
//! be diagnosed from a single log line. Upload errors are per file and never
//! abort a batch; a listing has exactly one top-level failure mode.

use std::fmt;

use hermes_storage::StorageError;

/// Which part of a document survived an incomplete delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    /// The stored file is still present; its sidecar is gone.
    Document,
    /// Nothing was removed.
    Both,
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document => f.write_str("document"),
            Self::Both => f.write_str("document and metadata"),
        }
    }
}

/// Errors from the sidecar metadata store.
#[derive(Debug, thiserror::Error)]
pub enum MetadataError {
    /// The document (or, for reads, its sidecar record) does not exist.
    #[error("document '{filename}' not found")]
    NotFound { filename: String },

    /// The sidecar exists but is not a valid metadata record.
    #[error("metadata for '{filename}' is corrupt: {reason}")]
    CorruptMetadata { filename: String, reason: String },

    /// The name is not a valid document name.
    #[error("invalid document name '{filename}': {reason}")]
    InvalidName { filename: String, reason: String },

    /// A delete removed less than both resources.
    #[error("delete of '{filename}' incomplete, {remaining} still present: {reason}")]
    PartialDelete {
        filename: String,
        remaining: Remaining,
        reason: String,
    },

    /// The record could not be encoded.
    #[error("failed to encode metadata for '{filename}': {reason}")]
    Encode { filename: String, reason: String },

    /// The underlying blob store failed.
    #[error("metadata storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Reasons an upload validator rejects a single file.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    /// The file exceeds the configured size limit.
    #[error("'{filename}' is {size} bytes, the limit is {max} bytes")]
    TooLarge { filename: String, size: u64, max: u64 },

    /// The content type is not in the allow-list.
    #[error("'{filename}' has unsupported content type '{content_type}'")]
    UnsupportedType {
        filename: String,
        content_type: String,
    },

    /// The filename is unusable as a stored document name.
    #[error("invalid filename '{filename}': {reason}")]
    InvalidName { filename: String, reason: String },
}

impl ValidationError {
    /// The name of the rejected file.
    #[must_use]
    pub fn filename(&self) -> &str {
        match self {
            Self::TooLarge { filename, .. }
            | Self::UnsupportedType { filename, .. }
            | Self::InvalidName { filename, .. } => filename,
        }
    }
}

/// Per-file upload failures.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    /// The file was rejected before anything was written.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Persisting the file or its metadata failed.
    #[error("failed to store '{filename}': {reason}")]
    Write { filename: String, reason: String },
}

/// The single top-level failure of a document listing.
#[derive(Debug, thiserror::Error)]
pub enum ListError {
    /// The store could not be enumerated.
    #[error("failed to enumerate documents: {0}")]
    Enumerate(#[from] StorageError),
}
