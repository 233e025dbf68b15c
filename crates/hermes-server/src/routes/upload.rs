//! Upload route: `POST /upload`
//!
//! Multipart body with repeated `files` parts and one optional `metadata`
//! part holding a JSON object shared by every file. The response lists the
//! outcome of each file.

use std::sync::Arc;

use axum::extract::multipart::{Field, MultipartError};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use tracing::{debug, warn};

use hermes_core::metadata::MetadataPatch;
use hermes_core::error::ValidationError;
use hermes_core::upload::{IncomingFile, UploadReport, UploadStatus};

use crate::error::AppError;
use crate::state::AppState;

/// Multipart field carrying a file.
const FILES_FIELD: &str = "files";

/// Multipart field carrying the shared metadata JSON.
const METADATA_FIELD: &str = "metadata";

/// Build the upload router with the given request body limit in bytes.
pub fn router(body_limit: usize) -> Router<Arc<AppState>> {
    Router::new().route(
        "/upload",
        post(upload).layer(DefaultBodyLimit::max(body_limit)),
    )
}

/// Accept a batch of files.
///
/// Answers `200` when at least one file was stored or every file was already
/// present, `422` when nothing was stored.
async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadReport>), AppError> {
    if !state.flags.has_feature("documentUpload") {
        return Err(AppError::Forbidden(
            "document upload is disabled".to_owned(),
        ));
    }

    let mut files = Vec::new();
    let mut patch = MetadataPatch::default();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().map(ToOwned::to_owned);
        match name.as_deref() {
            Some(FILES_FIELD) => {
                if files.len() >= state.max_files_per_upload {
                    return Err(AppError::BadRequest(format!(
                        "at most {} files may be uploaded at once",
                        state.max_files_per_upload
                    )));
                }
                let max = state.uploads.policy().max_file_size;
                files.push(receive_file(field, max).await?);
            }
            Some(METADATA_FIELD) => {
                let raw = field.text().await?;
                if !raw.trim().is_empty() {
                    patch = serde_json::from_str(&raw).map_err(|e| {
                        AppError::BadRequest(format!("invalid metadata: {e}"))
                    })?;
                }
            }
            other => {
                debug!(field = ?other, "ignoring unknown multipart field");
            }
        }
    }

    let report = state.uploads.handle_received(files, patch).await;
    let status = match report.status {
        UploadStatus::Success | UploadStatus::Partial => StatusCode::OK,
        UploadStatus::Error => StatusCode::UNPROCESSABLE_ENTITY,
    };

    Ok((status, Json(report)))
}

/// Read one file part, keeping at most `max` bytes in memory.
///
/// A part that grows past `max` is drained without buffering and comes back
/// as [`ValidationError::TooLarge`] carrying its full size.
async fn receive_file(
    mut field: Field<'_>,
    max: u64,
) -> Result<Result<IncomingFile, ValidationError>, MultipartError> {
    let filename = field.file_name().unwrap_or_default().to_owned();
    let content_type = field.content_type().map(ToOwned::to_owned);

    let mut bytes = Vec::new();
    let mut size: u64 = 0;
    let mut oversized = false;
    while let Some(chunk) = field.chunk().await? {
        size = size.saturating_add(chunk.len() as u64);
        if size <= max {
            bytes.extend_from_slice(&chunk);
        } else if !oversized {
            warn!(filename = %filename, max, "file exceeds the size limit, discarding");
            oversized = true;
            bytes = Vec::new();
        }
    }

    if oversized {
        return Ok(Err(ValidationError::TooLarge {
            filename,
            size,
            max,
        }));
    }
    Ok(Ok(IncomingFile::new(filename, content_type, bytes)))
}
