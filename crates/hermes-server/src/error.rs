//! HTTP error types for the Hermes server.
//!
//! Maps domain errors from `hermes-core` into HTTP responses. Every error
//! variant produces a JSON body with a machine-readable `error` field and a
//! human-readable `message`.

use axum::extract::multipart::MultipartError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use hermes_core::error::{ListError, MetadataError};

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// The feature behind this route is switched off.
    Forbidden(String),
    /// Requested document not found.
    NotFound(String),
    /// Client sent invalid input.
    BadRequest(String),
    /// The request body exceeds the configured limit.
    PayloadTooLarge(String),
    /// Internal server error.
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            Self::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
            Self::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "payload_too_large", msg)
            }
            Self::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg),
        };

        if status.is_server_error() {
            tracing::error!(%status, message = %message, "request failed");
        }

        let body = ErrorBody {
            error: error_type,
            message,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<MetadataError> for AppError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound { .. } => Self::NotFound(err.to_string()),
            MetadataError::InvalidName { .. } => Self::BadRequest(err.to_string()),
            MetadataError::CorruptMetadata { .. }
            | MetadataError::PartialDelete { .. }
            | MetadataError::Encode { .. }
            | MetadataError::Storage(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<ListError> for AppError {
    fn from(err: ListError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<MultipartError> for AppError {
    fn from(err: MultipartError) -> Self {
        if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge(err.body_text())
        } else {
            Self::BadRequest(err.body_text())
        }
    }
}

#[cfg(test)]
mod tests {
    use hermes_core::error::Remaining;

    use super::*;

    #[test]
    fn metadata_errors_map_to_status_codes() {
        let cases = [
            (
                MetadataError::NotFound {
                    filename: "a".to_owned(),
                },
                StatusCode::NOT_FOUND,
            ),
            (
                MetadataError::InvalidName {
                    filename: "..".to_owned(),
                    reason: "bad".to_owned(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (
                MetadataError::PartialDelete {
                    filename: "a".to_owned(),
                    remaining: Remaining::Document,
                    reason: "busy".to_owned(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
