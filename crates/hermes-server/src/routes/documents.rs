//! Document routes: `/api/documents`
//!
//! Lists the documents visible to the requester and deletes documents
//! together with their metadata.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get};
use axum::{Json, Router};
use tracing::info;

use hermes_core::lister::Document;

use crate::error::AppError;
use crate::requester::Requester;
use crate::state::AppState;

/// Build the documents router.
///
/// Paths:
/// - `GET    /api/documents` lists visible documents
/// - `DELETE /api/documents/{filename}` deletes one document and its sidecar
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/documents", get(list_documents))
        .route("/api/documents/{filename}", delete(delete_document))
}

async fn list_documents(
    State(state): State<Arc<AppState>>,
    requester: Requester,
) -> Result<Json<Vec<Document>>, AppError> {
    let documents = state.lister.list_visible_to(&requester.department).await?;
    info!(
        department = %requester.department,
        count = documents.len(),
        "documents listed"
    );
    Ok(Json(documents))
}

async fn delete_document(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<StatusCode, AppError> {
    state.metadata.delete(&filename).await?;
    Ok(StatusCode::NO_CONTENT)
}
