//! Sidecar metadata records.
//!
//! Every stored document `report.pdf` has one JSON record at
//! `report.pdf.meta` in the same store. The record holds the access level,
//! the owning department and a content fingerprint. Records are written once
//! on upload and never mutated; a delete removes the sidecar and the document
//! together.
//!
//! Missing fields are never an error. Both the upload payload and the record
//! on disk are completed with the portal defaults, and an empty string counts
//! as a missing value.

use std::fmt;
use std::sync::Arc;

use hermes_storage::{BlobStore, StorageError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tracing::{debug, info};

use crate::error::{MetadataError, Remaining};

/// Suffix that turns a document name into its sidecar name.
pub const SIDECAR_SUFFIX: &str = ".meta";

/// Department recorded when the uploader names none.
pub const DEFAULT_OWNER_DEPARTMENT: &str = "[1014] Sistemas";

/// Fingerprint recorded when the uploader supplies none.
pub const PLACEHOLDER_CONTENT_HASH: &str = "hash_no_disponible";

/// Return the sidecar name for a document.
#[must_use]
pub fn sidecar_name(filename: &str) -> String {
    format!("{filename}{SIDECAR_SUFFIX}")
}

/// Return `true` if the blob name is a sidecar record rather than a document.
#[must_use]
pub fn is_sidecar(name: &str) -> bool {
    name.ends_with(SIDECAR_SUFFIX)
}

/// Check that `filename` can be stored as a document.
///
/// A document name is a single ordinary path component that does not end in
/// the reserved sidecar suffix.
///
/// # Errors
///
/// Returns [`MetadataError::InvalidName`] describing the first rule violated.
pub fn validate_document_name(filename: &str) -> Result<(), MetadataError> {
    hermes_storage::validate_name(filename).map_err(|e| match e {
        StorageError::InvalidName { reason, .. } => MetadataError::InvalidName {
            filename: filename.to_owned(),
            reason,
        },
        other => MetadataError::Storage(other),
    })?;

    if is_sidecar(filename) {
        return Err(MetadataError::InvalidName {
            filename: filename.to_owned(),
            reason: format!("names ending in '{SIDECAR_SUFFIX}' are reserved"),
        });
    }

    Ok(())
}

// ── Access level ─────────────────────────────────────────────────────

/// Who may see a document.
///
/// Stored as a plain string. Unknown strings are preserved as
/// [`AccessLevel::Other`] so that the access filter can hide them instead of
/// failing the whole record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum AccessLevel {
    /// Visible to everyone.
    #[default]
    Publico,
    /// Visible to the owning department.
    Departamento,
    /// Visible to the owning department.
    Privado,
    /// Any value the portal does not recognise.
    Other(String),
}

impl AccessLevel {
    /// Parse a stored or submitted value. Never fails.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value {
            "publico" => Self::Publico,
            "departamento" => Self::Departamento,
            "privado" => Self::Privado,
            other => Self::Other(other.to_owned()),
        }
    }

    /// The wire representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Publico => "publico",
            Self::Departamento => "departamento",
            Self::Privado => "privado",
            Self::Other(value) => value,
        }
    }
}

impl fmt::Display for AccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for AccessLevel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AccessLevel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Self::parse(&value))
    }
}

// ── Records ──────────────────────────────────────────────────────────

/// The completed metadata record stored beside a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentMetadata {
    pub access_level: AccessLevel,
    pub owner_department: String,
    pub content_hash: String,
}

impl Default for DocumentMetadata {
    fn default() -> Self {
        Self {
            access_level: AccessLevel::Publico,
            owner_department: DEFAULT_OWNER_DEPARTMENT.to_owned(),
            content_hash: PLACEHOLDER_CONTENT_HASH.to_owned(),
        }
    }
}

impl<'de> Deserialize<'de> for DocumentMetadata {
    /// Records written by older clients may lack fields or carry empty
    /// strings; both are completed with the defaults.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        MetadataPatch::deserialize(deserializer).map(MetadataPatch::complete)
    }
}

/// The shared metadata payload submitted with an upload.
///
/// Every field is optional. [`complete`](Self::complete) fills the gaps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataPatch {
    pub access_level: Option<String>,
    pub owner_department: Option<String>,
    pub content_hash: Option<String>,
}

impl MetadataPatch {
    /// Build the completed record, substituting defaults for omitted or
    /// empty fields.
    #[must_use]
    pub fn complete(self) -> DocumentMetadata {
        let defaults = DocumentMetadata::default();
        DocumentMetadata {
            access_level: non_empty(self.access_level)
                .map_or(defaults.access_level, |v| AccessLevel::parse(&v)),
            owner_department: non_empty(self.owner_department)
                .unwrap_or(defaults.owner_department),
            content_hash: non_empty(self.content_hash).unwrap_or(defaults.content_hash),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

// ── Store ────────────────────────────────────────────────────────────

/// Reads, writes and deletes documents together with their sidecars.
///
/// Cheap to clone; clones share the blob store.
#[derive(Clone)]
pub struct MetadataStore {
    blobs: Arc<dyn BlobStore>,
}

impl fmt::Debug for MetadataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataStore").finish_non_exhaustive()
    }
}

impl MetadataStore {
    /// Create a metadata store over the given blob backend.
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self { blobs }
    }

    /// The blob backend holding documents and sidecars.
    #[must_use]
    pub fn blobs(&self) -> &Arc<dyn BlobStore> {
        &self.blobs
    }

    /// Write the sidecar for `filename`, replacing any existing record.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::InvalidName`] for a bad name, or
    /// [`MetadataError::Storage`] if the sidecar cannot be written.
    pub async fn write(
        &self,
        filename: &str,
        record: &DocumentMetadata,
    ) -> Result<(), MetadataError> {
        validate_document_name(filename)?;

        let bytes = serde_json::to_vec_pretty(record).map_err(|e| MetadataError::Encode {
            filename: filename.to_owned(),
            reason: e.to_string(),
        })?;

        self.blobs.put(&sidecar_name(filename), &bytes).await?;
        debug!(filename, access_level = %record.access_level, "metadata written");
        Ok(())
    }

    /// Read the sidecar for `filename`.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::NotFound`] when no sidecar exists,
    /// [`MetadataError::CorruptMetadata`] when it does not parse, and
    /// [`MetadataError::InvalidName`] for a bad name.
    pub async fn read(&self, filename: &str) -> Result<DocumentMetadata, MetadataError> {
        validate_document_name(filename)?;

        let bytes = self
            .blobs
            .get(&sidecar_name(filename))
            .await?
            .ok_or_else(|| MetadataError::NotFound {
                filename: filename.to_owned(),
            })?;

        serde_json::from_slice(&bytes).map_err(|e| MetadataError::CorruptMetadata {
            filename: filename.to_owned(),
            reason: e.to_string(),
        })
    }

    /// Delete a document and its sidecar.
    ///
    /// The sidecar goes first, then the document. A missing sidecar is fine.
    /// Success means both are gone.
    ///
    /// # Errors
    ///
    /// Returns [`MetadataError::NotFound`] when the document does not exist
    /// (nothing is touched), [`MetadataError::PartialDelete`] when either
    /// removal fails, and [`MetadataError::InvalidName`] for a bad name.
    pub async fn delete(&self, filename: &str) -> Result<(), MetadataError> {
        validate_document_name(filename)?;

        if !self.blobs.exists(filename).await? {
            return Err(MetadataError::NotFound {
                filename: filename.to_owned(),
            });
        }

        self.blobs
            .delete(&sidecar_name(filename))
            .await
            .map_err(|e| MetadataError::PartialDelete {
                filename: filename.to_owned(),
                remaining: Remaining::Both,
                reason: e.to_string(),
            })?;

        self.blobs
            .delete(filename)
            .await
            .map_err(|e| MetadataError::PartialDelete {
                filename: filename.to_owned(),
                remaining: Remaining::Document,
                reason: e.to_string(),
            })?;

        info!(filename, "document deleted");
        Ok(())
    }
}
