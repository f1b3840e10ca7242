//! HTTP handlers for the upload lifecycle.
//! Part bodies are streamed straight to the backend without buffering in
//! memory; everything else is small JSON envelopes.

use axum::{
    Json,
    body::Body,
    extract::{Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use std::io;

use crate::auth;
use crate::errors::{UploadError, UploadResult};
use crate::handlers::envelope;
use crate::services::upload_service::InitiateParams;
use crate::state::AppState;
use crate::storage::PartEtag;

/// Header naming the upload a part belongs to.
pub const UPLOAD_ID_HEADER: &str = "x-upload-id";
/// Header carrying the 1-based part number.
pub const PART_NUMBER_HEADER: &str = "x-part-number";

/// Request body for `POST /uploads/complete`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompleteRequest {
    pub upload_id: Option<String>,
    pub parts: Option<Vec<PartEtag>>,
}

/// Request body for `POST /uploads/abort`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AbortRequest {
    pub upload_id: Option<String>,
}

/// Query params accepted by `GET /uploads/status`.
#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    #[serde(rename = "uploadId")]
    pub upload_id: Option<String>,
}

/// `POST /uploads` — open a resumable upload session.
pub async fn initiate_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(params): Json<InitiateParams>,
) -> Result<impl IntoResponse, UploadError> {
    let owner = auth::require_owner(&headers)?;
    let session = state.uploads.initiate(&owner, params).await?;

    Ok(envelope(json!({
        "uploadId": session.upload_id,
        "objectKey": session.object_key,
        "chunkSize": session.chunk_size,
        "totalParts": session.total_parts,
        "expiresAt": session.expires_at,
    })))
}

/// `PUT /uploads/part` — upload one part as raw bytes, identified by the
/// upload id and part number headers.
pub async fn upload_part(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, UploadError> {
    let owner = auth::require_owner(&headers)?;
    let upload_id = required_header(&headers, UPLOAD_ID_HEADER)?;
    let part_number = part_number_header(&headers)?;

    let stream = body
        .into_data_stream()
        .map(|chunk| chunk.map_err(|err| io::Error::new(io::ErrorKind::Other, err)))
        .boxed();

    let progress = state
        .uploads
        .upload_part(&owner, &upload_id, part_number, stream)
        .await?;
    Ok(envelope(progress))
}

/// `POST /uploads/complete` — assemble the final object from the caller's
/// part manifest.
pub async fn complete_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<CompleteRequest>,
) -> Result<impl IntoResponse, UploadError> {
    let owner = auth::require_owner(&headers)?;
    let upload_id = required_text(req.upload_id, "uploadId")?;
    let parts = req
        .parts
        .ok_or_else(|| UploadError::InvalidRequest("parts is required".into()))?;

    let completed = state.uploads.complete(&owner, &upload_id, parts).await?;
    Ok(envelope(completed))
}

/// `POST /uploads/abort` — discard an open upload and everything staged
/// for it.
pub async fn abort_upload(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<AbortRequest>,
) -> Result<impl IntoResponse, UploadError> {
    let owner = auth::require_owner(&headers)?;
    let upload_id = required_text(req.upload_id, "uploadId")?;

    state.uploads.abort(&owner, &upload_id).await?;
    Ok(envelope(json!({ "aborted": true })))
}

/// `GET /uploads/status?uploadId=...` — resume view for a client deciding
/// which parts to re-send.
pub async fn upload_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(q): Query<StatusQuery>,
) -> Result<impl IntoResponse, UploadError> {
    let owner = auth::require_owner(&headers)?;
    let upload_id = required_text(q.upload_id, "uploadId")?;

    let status = state.uploads.status(&owner, &upload_id).await?;
    Ok(envelope(status))
}

fn required_text(value: Option<String>, field: &str) -> UploadResult<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| UploadError::InvalidRequest(format!("{} is required", field)))
}

fn required_header(headers: &HeaderMap, name: &str) -> UploadResult<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or_else(|| UploadError::InvalidRequest(format!("{} header is required", name)))
}

fn part_number_header(headers: &HeaderMap) -> UploadResult<i32> {
    required_header(headers, PART_NUMBER_HEADER)?
        .parse::<i32>()
        .map_err(|_| {
            UploadError::InvalidPartNumber("part number header must be an integer".into())
        })
}
