//! Upload validation and persistence.
//!
//! A batch is any number of files sharing one metadata payload. Each file is
//! validated, written under its original name and given a sidecar record.
//! Every file gets its own outcome; one failure never aborts the batch.
//!
//! Two uploads of the same name race and the last writer wins. There is no
//! merge and no versioning.

use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{MetadataError, UploadError, ValidationError};
use crate::metadata::{DocumentMetadata, MetadataPatch, MetadataStore, validate_document_name};

/// Default per-file size limit: 25 MiB.
pub const DEFAULT_MAX_FILE_SIZE: u64 = 25 * 1024 * 1024;

/// Content types accepted by default: PDF, Word, plain text, PowerPoint and
/// Excel.
pub const DEFAULT_ALLOWED_TYPES: [&str; 5] = [
    "application/pdf",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "text/plain",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

const OCTET_STREAM: &str = "application/octet-stream";

/// What an upload may contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPolicy {
    /// Largest accepted file in bytes.
    pub max_file_size: u64,
    /// Accepted MIME essences (no parameters), lowercase.
    pub allowed_types: Vec<String>,
    /// Skip files whose name, size and SHA-256 match a stored document.
    pub detect_duplicates: bool,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            allowed_types: DEFAULT_ALLOWED_TYPES.iter().map(|t| (*t).to_owned()).collect(),
            detect_duplicates: false,
        }
    }
}

impl UploadPolicy {
    /// Check one file against the policy without touching storage.
    ///
    /// # Errors
    ///
    /// Returns the first rule the file breaks, checked in the order name,
    /// size, content type.
    pub fn validate(&self, file: &IncomingFile) -> Result<(), ValidationError> {
        validate_document_name(&file.filename).map_err(|e| match e {
            MetadataError::InvalidName { filename, reason } => {
                ValidationError::InvalidName { filename, reason }
            }
            other => ValidationError::InvalidName {
                filename: file.filename.clone(),
                reason: other.to_string(),
            },
        })?;

        let size = file.bytes.len() as u64;
        if size > self.max_file_size {
            return Err(ValidationError::TooLarge {
                filename: file.filename.clone(),
                size,
                max: self.max_file_size,
            });
        }

        let content_type = file.effective_content_type();
        if !self.allowed_types.iter().any(|t| *t == content_type) {
            return Err(ValidationError::UnsupportedType {
                filename: file.filename.clone(),
                content_type,
            });
        }

        Ok(())
    }
}

/// One file of an upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingFile {
    /// Original client-side filename.
    pub filename: String,
    /// Declared content type, if the client sent one.
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl IncomingFile {
    pub fn new(
        filename: impl Into<String>,
        content_type: Option<String>,
        bytes: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            filename: filename.into(),
            content_type,
            bytes: bytes.into(),
        }
    }

    /// The MIME essence used for validation.
    ///
    /// Parameters are stripped and the result is lowercased. A missing,
    /// empty or `application/octet-stream` declaration is replaced by a
    /// guess from the filename extension.
    #[must_use]
    pub fn effective_content_type(&self) -> String {
        let declared = self
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(|ct| ct.trim().to_ascii_lowercase())
            .filter(|ct| !ct.is_empty() && ct != OCTET_STREAM);

        declared.unwrap_or_else(|| {
            mime_guess::from_path(&self.filename)
                .first_or_octet_stream()
                .essence_str()
                .to_owned()
        })
    }
}

/// Hex-encoded SHA-256 of `bytes`.
#[must_use]
pub fn content_fingerprint(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

// ── Outcomes ─────────────────────────────────────────────────────────

/// Result of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Success,
    Duplicate,
    Error,
}

/// Why a file failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureKind {
    /// The file broke an upload rule and nothing was written.
    Validation,
    /// Persisting the file or its sidecar failed.
    Write,
}

impl From<&UploadError> for FailureKind {
    fn from(err: &UploadError) -> Self {
        match err {
            UploadError::Validation(_) => Self::Validation,
            UploadError::Write { .. } => Self::Write,
        }
    }
}

/// Per-file entry of an [`UploadReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileOutcome {
    pub filename: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl FileOutcome {
    fn failed(filename: String, err: &UploadError) -> Self {
        Self {
            filename,
            status: FileStatus::Error,
            kind: Some(FailureKind::from(err)),
            reason: Some(err.to_string()),
        }
    }
}

/// Aggregate result of a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Every file was stored or already present.
    Success,
    /// Some files were stored and some failed.
    Partial,
    /// Nothing was stored and something failed, or the batch was empty.
    Error,
}

/// Response to an upload batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadReport {
    pub status: UploadStatus,
    pub files: Vec<FileOutcome>,
}

impl UploadReport {
    /// Derive the aggregate status from per-file outcomes.
    #[must_use]
    pub fn from_outcomes(files: Vec<FileOutcome>) -> Self {
        let failed = files.iter().filter(|f| f.status == FileStatus::Error).count();
        let stored = files.iter().filter(|f| f.status == FileStatus::Success).count();

        let status = if files.is_empty() || (stored == 0 && failed > 0) {
            UploadStatus::Error
        } else if failed == 0 {
            UploadStatus::Success
        } else {
            UploadStatus::Partial
        };

        Self { status, files }
    }
}

// ── Handler ──────────────────────────────────────────────────────────

/// Validates and stores upload batches.
#[derive(Debug, Clone)]
pub struct UploadHandler {
    metadata: MetadataStore,
    policy: UploadPolicy,
}

impl UploadHandler {
    pub fn new(metadata: MetadataStore, policy: UploadPolicy) -> Self {
        Self { metadata, policy }
    }

    #[must_use]
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// Store every file of a batch with the shared metadata payload.
    ///
    /// Files are processed in order. Omitted or empty metadata fields are
    /// completed with defaults before anything is written.
    pub async fn handle(&self, files: Vec<IncomingFile>, patch: MetadataPatch) -> UploadReport {
        self.handle_received(files.into_iter().map(Ok).collect(), patch)
            .await
    }

    /// Like [`handle`](Self::handle), for batches where the transport already
    /// rejected some files, e.g. a part that outgrew the size limit while it
    /// was being received. Rejected entries keep their position in the
    /// report.
    pub async fn handle_received(
        &self,
        files: Vec<Result<IncomingFile, ValidationError>>,
        patch: MetadataPatch,
    ) -> UploadReport {
        let record = patch.complete();
        let mut outcomes = Vec::with_capacity(files.len());

        for received in files {
            let (filename, result) = match received {
                Ok(file) => {
                    let result = self.store_one(&file, &record).await;
                    (file.filename, result)
                }
                Err(rejection) => (
                    rejection.filename().to_owned(),
                    Err(UploadError::Validation(rejection)),
                ),
            };
            let outcome = match result {
                Ok(status) => FileOutcome {
                    filename,
                    status,
                    kind: None,
                    reason: None,
                },
                Err(e) => {
                    warn!(filename = %filename, error = %e, "upload rejected");
                    FileOutcome::failed(filename, &e)
                }
            };
            outcomes.push(outcome);
        }

        let report = UploadReport::from_outcomes(outcomes);
        info!(
            status = ?report.status,
            files = report.files.len(),
            "upload batch processed"
        );
        report
    }

    async fn store_one(
        &self,
        file: &IncomingFile,
        record: &DocumentMetadata,
    ) -> Result<FileStatus, UploadError> {
        self.policy.validate(file)?;

        let write_err = |reason: String| UploadError::Write {
            filename: file.filename.clone(),
            reason,
        };

        if self.policy.detect_duplicates && self.is_duplicate(file).await? {
            debug!(filename = %file.filename, "identical document already stored");
            return Ok(FileStatus::Duplicate);
        }

        self.metadata
            .blobs()
            .put(&file.filename, &file.bytes)
            .await
            .map_err(|e| write_err(e.to_string()))?;

        self.metadata
            .write(&file.filename, record)
            .await
            .map_err(|e| write_err(e.to_string()))?;

        info!(
            filename = %file.filename,
            size = file.bytes.len(),
            access_level = %record.access_level,
            owner_department = %record.owner_department,
            "document stored"
        );
        Ok(FileStatus::Success)
    }

    /// Same name, same size, same SHA-256.
    async fn is_duplicate(&self, file: &IncomingFile) -> Result<bool, UploadError> {
        let existing = self
            .metadata
            .blobs()
            .get(&file.filename)
            .await
            .map_err(|e| UploadError::Write {
                filename: file.filename.clone(),
                reason: e.to_string(),
            })?;

        Ok(existing.is_some_and(|stored| {
            stored.len() == file.bytes.len()
                && content_fingerprint(&stored) == content_fingerprint(&file.bytes)
        }))
    }
}
