//! Storage error types.
//!
//! Every error variant carries the blob name (or store path) and a reason, so
//! the problem can be diagnosed from a single log line.

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Failed to open or create the store at the given path.
    #[error("failed to open store at '{path}': {reason}")]
    Open { path: String, reason: String },

    /// Failed to read a blob.
    #[error("failed to read '{name}': {reason}")]
    Read { name: String, reason: String },

    /// Failed to write a blob.
    #[error("failed to write '{name}': {reason}")]
    Write { name: String, reason: String },

    /// Failed to delete a blob.
    #[error("failed to delete '{name}': {reason}")]
    Delete { name: String, reason: String },

    /// Failed to enumerate the store.
    #[error("failed to list store: {reason}")]
    List { reason: String },

    /// The blob name is not a single safe path component.
    #[error("invalid blob name '{name}': {reason}")]
    InvalidName { name: String, reason: String },
}
