//! Document listing.
//!
//! Joins every stored document with its sidecar record. A bad record never
//! fails the listing: the row is completed with defaults and flagged as
//! degraded. The only top-level failure is an unreadable store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::access::is_visible;
use crate::error::{ListError, MetadataError};
use crate::metadata::{AccessLevel, DocumentMetadata, MetadataStore, is_sidecar};

/// One stored document as shown to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Document {
    pub filename: String,
    pub owner_department: String,
    pub access_level: AccessLevel,
    #[serde(skip_serializing)]
    pub content_hash: String,
    /// Size in bytes.
    pub file_size: u64,
    /// Last-modified time of the stored file.
    pub upload_date: Option<DateTime<Utc>>,
    /// The sidecar exists but could not be read; the metadata shown are
    /// defaults.
    pub degraded: bool,
}

/// Lists documents, optionally filtered for a requester.
#[derive(Debug, Clone)]
pub struct DocumentLister {
    metadata: MetadataStore,
}

impl DocumentLister {
    pub fn new(metadata: MetadataStore) -> Self {
        Self { metadata }
    }

    /// List every document in store enumeration order.
    ///
    /// Sidecars are not documents and orphaned sidecars are ignored. A
    /// document without a sidecar is listed with default metadata; one with
    /// an unreadable sidecar is listed with default metadata and
    /// `degraded = true`.
    ///
    /// # Errors
    ///
    /// Returns [`ListError::Enumerate`] if the store cannot be enumerated.
    pub async fn list(&self) -> Result<Vec<Document>, ListError> {
        let entries = self.metadata.blobs().list().await?;
        let mut documents = Vec::with_capacity(entries.len() / 2 + 1);

        for entry in entries {
            if is_sidecar(&entry.name) {
                continue;
            }

            let (record, degraded) = match self.metadata.read(&entry.name).await {
                Ok(record) => (record, false),
                Err(MetadataError::NotFound { .. }) => (DocumentMetadata::default(), false),
                Err(e) => {
                    warn!(filename = %entry.name, error = %e, "unreadable metadata, using defaults");
                    (DocumentMetadata::default(), true)
                }
            };

            documents.push(Document {
                filename: entry.name,
                owner_department: record.owner_department,
                access_level: record.access_level,
                content_hash: record.content_hash,
                file_size: entry.size,
                upload_date: entry.modified,
                degraded,
            });
        }

        Ok(documents)
    }

    /// List the documents visible to a requester from `department`.
    ///
    /// # Errors
    ///
    /// Returns [`ListError::Enumerate`] if the store cannot be enumerated.
    pub async fn list_visible_to(&self, department: &str) -> Result<Vec<Document>, ListError> {
        let mut documents = self.list().await?;
        documents.retain(|doc| is_visible(doc, department));
        Ok(documents)
    }
}
