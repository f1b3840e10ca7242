//! Upload API error taxonomy and JSON envelope rendering.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

/// Errors surfaced by the upload API.
///
/// Every variant maps to exactly one HTTP status and renders as the standard
/// `{"success": false, "error": {"message": ...}}` envelope. Missing and
/// expired sessions share a single variant so the two cases stay
/// indistinguishable on the wire, and `Forbidden` carries no detail beyond
/// the word itself.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("file size {size} exceeds the limit of {max} bytes")]
    FileTooLarge { size: i64, max: i64 },

    #[error("upload would need {parts} parts, limit is {max}; retry with a larger chunk size")]
    TooManyParts { parts: i64, max: i64 },

    #[error("invalid part number: {0}")]
    InvalidPartNumber(String),

    #[error("part body must not be empty")]
    EmptyPart,

    #[error("expected etags for all {expected} parts, got {got}")]
    PartCountMismatch { expected: i32, got: usize },

    #[error("missing identity")]
    MissingIdentity,

    #[error("forbidden")]
    Forbidden,

    #[error("upload session not found")]
    SessionNotFound,

    #[error("storage backend unavailable")]
    StorageUnavailable,

    #[error("completion failed, the session remains open for retry or abort")]
    CompletionFailed,

    #[error("session store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl UploadError {
    /// HTTP status this error renders with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_)
            | Self::FileTooLarge { .. }
            | Self::TooManyParts { .. }
            | Self::InvalidPartNumber(_)
            | Self::EmptyPart
            | Self::PartCountMismatch { .. } => StatusCode::BAD_REQUEST,
            Self::MissingIdentity => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::SessionNotFound => StatusCode::NOT_FOUND,
            Self::StorageUnavailable | Self::CompletionFailed => StatusCode::SERVICE_UNAVAILABLE,
            Self::Store(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "success": false,
            "error": { "message": self.to_string() }
        }));

        (self.status_code(), body).into_response()
    }
}

/// Result alias for upload handlers and services.
pub type UploadResult<T> = std::result::Result<T, UploadError>;
