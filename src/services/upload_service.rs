//! src/services/upload_service.rs
//!
//! UploadService — resumable chunked uploads against an injected session
//! store and multipart backend. One service instance is shared by every
//! request handler; each operation is a single pass with no in-process
//! session state, so any replica can serve any call for any upload id.

use chrono::{DateTime, Duration, Utc};
use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::{UploadError, UploadResult};
use crate::models::session::UploadSession;
use crate::models::storage_class::StorageClass;
use crate::services::notifier::{Notifier, ProcessingNotification};
use crate::services::session_store::SessionStore;
use crate::storage::{BackendError, MultipartBackend, PartBody, PartEtag};

/// Hard cap on the declared file size: 1 GiB.
pub const MAX_FILE_SIZE: i64 = 1024 * 1024 * 1024;
/// Smallest chunk the backend accepts: 5 MiB. Smaller requests are raised
/// silently rather than rejected.
pub const MIN_CHUNK_SIZE: i64 = 5 * 1024 * 1024;
/// Chunk size used when the caller does not ask for one: 10 MiB.
pub const DEFAULT_CHUNK_SIZE: i64 = 10 * 1024 * 1024;
/// Most parts a single upload may be planned into.
pub const MAX_PARTS: i64 = 10_000;
/// Sessions become unreachable this long after initiation.
pub const UPLOAD_EXPIRY_HOURS: i64 = 24;

const DEFAULT_FOLDER: &str = "uploads";
const MAX_FILENAME_LEN: usize = 120;
const SWEEP_BATCH: i64 = 100;

/// Initiation parameters as received from the transport layer. Presence
/// checks happen here, not in the extractor, so every missing field produces
/// the same envelope shape.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InitiateParams {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
    pub folder: Option<String>,
    pub chunk_size: Option<i64>,
}

/// Progress snapshot returned after a part upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartProgress {
    pub part_number: i32,
    pub etag: String,
    pub uploaded_count: i32,
    pub total_parts: i32,
    pub progress_percent: i32,
}

/// The durable result of a completed upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedUpload {
    pub url: String,
    pub key: String,
    pub filename: String,
    pub size: i64,
    pub content_type: String,
    pub etag: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Resume view: everything a client needs to decide which parts to re-send.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadStatus {
    pub filename: String,
    pub total_size: i64,
    pub chunk_size: i64,
    pub total_parts: i32,
    pub uploaded_parts: Vec<i32>,
    pub progress_percent: i32,
    pub expires_at: DateTime<Utc>,
}

/// Coordinates the whole upload lifecycle: initiate, part upload, completion,
/// abort, status, and the expiry sweep.
#[derive(Clone)]
pub struct UploadService {
    sessions: Arc<dyn SessionStore>,
    backend: Arc<dyn MultipartBackend>,
    notifier: Notifier,
    public_base_url: String,
}

impl UploadService {
    pub fn new(
        sessions: Arc<dyn SessionStore>,
        backend: Arc<dyn MultipartBackend>,
        notifier: Notifier,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            sessions,
            backend,
            notifier,
            public_base_url: public_base_url.into(),
        }
    }

    /// Open a new upload session and its backend multipart transaction.
    ///
    /// The order matters: the backend call comes first, and the session row
    /// is only written once the backend has an open transaction. If the row
    /// write then fails, the transaction is aborted again so neither side
    /// outlives the other.
    pub async fn initiate(
        &self,
        owner_id: &str,
        params: InitiateParams,
    ) -> UploadResult<UploadSession> {
        let filename = required_text(params.filename, "filename")?;
        let content_type = required_text(params.content_type, "contentType")?;
        let file_size = params
            .file_size
            .ok_or_else(|| UploadError::InvalidRequest("fileSize is required".into()))?;

        let (chunk_size, total_parts) = plan_parts(file_size, params.chunk_size)?;
        let storage_class = StorageClass::from_content_type(&content_type);
        let now = Utc::now();
        let object_key = build_object_key(owner_id, params.folder.as_deref(), &filename, now);

        let upload_id = self
            .backend
            .initiate(storage_class, &object_key, &content_type)
            .await
            .map_err(|err| {
                error!("backend initiate failed for {}: {}", object_key, err);
                UploadError::StorageUnavailable
            })?;

        let session = UploadSession {
            upload_id,
            object_key,
            storage_class,
            owner_id: owner_id.to_string(),
            filename,
            content_type,
            total_size: file_size,
            chunk_size,
            total_parts,
            created_at: now,
            expires_at: now + Duration::hours(UPLOAD_EXPIRY_HOURS),
        };

        if let Err(err) = self.sessions.create(&session).await {
            // The backend transaction is already open; close it again so
            // neither side outlives the other.
            if let Err(abort_err) = self
                .backend
                .abort(session.storage_class, &session.upload_id)
                .await
            {
                warn!(
                    "failed to abort backend upload {} after store error: {}",
                    session.upload_id, abort_err
                );
            }
            return Err(err.into());
        }

        info!(
            "initiated upload {} as {} ({} parts of {} bytes)",
            session.upload_id, session.object_key, session.total_parts, session.chunk_size
        );
        Ok(session)
    }

    /// Store one part and record it in the session's part set.
    pub async fn upload_part(
        &self,
        owner_id: &str,
        upload_id: &str,
        part_number: i32,
        body: PartBody,
    ) -> UploadResult<PartProgress> {
        if part_number < 1 {
            return Err(UploadError::InvalidPartNumber(
                "part number must be at least 1".into(),
            ));
        }
        let session = self.authorized_session(owner_id, upload_id).await?;
        if part_number > session.total_parts {
            return Err(UploadError::InvalidPartNumber(format!(
                "part number {} exceeds the plan of {} parts",
                part_number, session.total_parts
            )));
        }

        let body = reject_empty(body).await?;
        let stored = self
            .backend
            .upload_part(session.storage_class, upload_id, part_number, body)
            .await
            .map_err(|err| match err {
                BackendError::UploadNotFound(_) => UploadError::SessionNotFound,
                other => {
                    error!(
                        "backend refused part {} of upload {}: {}",
                        part_number, upload_id, other
                    );
                    UploadError::StorageUnavailable
                }
            })?;

        // Set union: re-uploading a part refreshes its receipt without
        // growing the set.
        self.sessions
            .record_part(upload_id, part_number, &stored.etag)
            .await?;
        let uploaded_count = self.sessions.parts(upload_id).await?.len() as i32;

        debug!(
            "stored part {}/{} of upload {} ({} bytes)",
            part_number, session.total_parts, upload_id, stored.size
        );
        Ok(PartProgress {
            part_number,
            etag: stored.etag,
            uploaded_count,
            total_parts: session.total_parts,
            progress_percent: progress_percent(uploaded_count, session.total_parts),
        })
    }

    /// Assemble the final object from the caller's part manifest.
    pub async fn complete(
        &self,
        owner_id: &str,
        upload_id: &str,
        mut parts: Vec<PartEtag>,
    ) -> UploadResult<CompletedUpload> {
        let session = self.authorized_session(owner_id, upload_id).await?;
        if parts.len() != session.total_parts as usize {
            return Err(UploadError::PartCountMismatch {
                expected: session.total_parts,
                got: parts.len(),
            });
        }
        // The backend requires strictly increasing part numbers; callers are
        // not trusted to pre-sort.
        parts.sort_by_key(|p| p.part_number);

        let etag = self
            .backend
            .complete(
                session.storage_class,
                upload_id,
                &session.object_key,
                &parts,
            )
            .await
            .map_err(|err| {
                error!("completion failed for upload {}: {}", upload_id, err);
                UploadError::CompletionFailed
            })?;

        // The backend transaction no longer exists, so the session row must
        // go too. If the delete fails the row is a harmless orphan the sweep
        // will reap.
        if let Err(err) = self.sessions.delete(upload_id).await {
            warn!(
                "failed to delete session {} after completion: {}",
                upload_id, err
            );
        }

        let uploaded_at = Utc::now();
        let url = format!(
            "{}/{}/{}",
            self.public_base_url,
            session.storage_class.bucket(),
            session.object_key
        );

        if StorageClass::is_video(&session.content_type) {
            self.notifier.notify(ProcessingNotification {
                upload_id: upload_id.to_string(),
                object_key: session.object_key.clone(),
                filename: session.filename.clone(),
                content_type: session.content_type.clone(),
                total_size: session.total_size,
                file_url: url.clone(),
                owner_id: session.owner_id.clone(),
                timestamp: uploaded_at,
            });
        }

        info!("completed upload {} -> {}", upload_id, session.object_key);
        Ok(CompletedUpload {
            url,
            key: session.object_key,
            filename: session.filename,
            size: session.total_size,
            content_type: session.content_type,
            etag,
            uploaded_at,
        })
    }

    /// Abort an open upload and discard everything staged for it.
    pub async fn abort(&self, owner_id: &str, upload_id: &str) -> UploadResult<()> {
        let session = self.authorized_session(owner_id, upload_id).await?;

        match self.backend.abort(session.storage_class, upload_id).await {
            Ok(()) => {}
            Err(BackendError::UploadNotFound(_)) => {
                // Nothing staged backend-side; the end state is what the
                // caller asked for.
                debug!("backend upload {} already gone during abort", upload_id);
            }
            Err(err) => {
                error!("backend abort failed for upload {}: {}", upload_id, err);
                return Err(UploadError::StorageUnavailable);
            }
        }

        self.sessions.delete(upload_id).await?;
        info!("aborted upload {}", upload_id);
        Ok(())
    }

    /// Resume view. Pure read: no backend call, cheap to poll.
    pub async fn status(&self, owner_id: &str, upload_id: &str) -> UploadResult<UploadStatus> {
        let session = self.authorized_session(owner_id, upload_id).await?;
        let parts = self.sessions.parts(upload_id).await?;

        let uploaded_parts: Vec<i32> = parts.iter().map(|p| p.part_number).collect();
        let uploaded_count = uploaded_parts.len() as i32;
        Ok(UploadStatus {
            filename: session.filename,
            total_size: session.total_size,
            chunk_size: session.chunk_size,
            total_parts: session.total_parts,
            uploaded_parts,
            progress_percent: progress_percent(uploaded_count, session.total_parts),
            expires_at: session.expires_at,
        })
    }

    /// Reap one batch of expired sessions: abort the backend transaction,
    /// then drop the row. Rows whose backend abort fails are kept for the
    /// next sweep.
    pub async fn reap_expired(&self) -> UploadResult<usize> {
        let stale = self.sessions.expired(SWEEP_BATCH).await?;
        let mut reaped = 0;

        for session in stale {
            match self
                .backend
                .abort(session.storage_class, &session.upload_id)
                .await
            {
                Ok(()) | Err(BackendError::UploadNotFound(_)) => {}
                Err(err) => {
                    warn!(
                        "sweep could not abort backend upload {}: {}",
                        session.upload_id, err
                    );
                    continue;
                }
            }
            if let Err(err) = self.sessions.delete(&session.upload_id).await {
                warn!(
                    "sweep could not delete session {}: {}",
                    session.upload_id, err
                );
                continue;
            }
            reaped += 1;
        }

        Ok(reaped)
    }

    /// Fetch a live session and enforce that `owner_id` created it. A store
    /// miss and an expired row are deliberately the same error.
    async fn authorized_session(
        &self,
        owner_id: &str,
        upload_id: &str,
    ) -> UploadResult<UploadSession> {
        let session = self
            .sessions
            .get(upload_id)
            .await?
            .ok_or(UploadError::SessionNotFound)?;
        if session.owner_id != owner_id {
            return Err(UploadError::Forbidden);
        }
        Ok(session)
    }
}

/// Validate the declared size and derive the part plan.
fn plan_parts(file_size: i64, requested_chunk_size: Option<i64>) -> UploadResult<(i64, i32)> {
    if file_size <= 0 {
        return Err(UploadError::InvalidRequest(
            "fileSize must be a positive byte count".into(),
        ));
    }
    if file_size > MAX_FILE_SIZE {
        return Err(UploadError::FileTooLarge {
            size: file_size,
            max: MAX_FILE_SIZE,
        });
    }

    // Chunk requests are clamped, not rejected: undersized rises to the
    // minimum, oversized caps at the file-size limit (a single part).
    let chunk_size = requested_chunk_size
        .unwrap_or(DEFAULT_CHUNK_SIZE)
        .clamp(MIN_CHUNK_SIZE, MAX_FILE_SIZE);
    // Ceiling division; i64 has no stable div_ceil. Both operands are
    // positive and bounded, so the sum cannot overflow.
    let total_parts = (file_size + chunk_size - 1) / chunk_size;
    if total_parts > MAX_PARTS {
        return Err(UploadError::TooManyParts {
            parts: total_parts,
            max: MAX_PARTS,
        });
    }

    Ok((chunk_size, total_parts as i32))
}

fn required_text(value: Option<String>, field: &str) -> UploadResult<String> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(UploadError::InvalidRequest(format!(
            "{} is required",
            field
        ))),
    }
}

fn progress_percent(uploaded: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    ((uploaded as f64 / total as f64) * 100.0).round() as i32
}

/// Derive a collision-resistant object key: `folder/owner/millis-token-name`.
/// Every component is sanitized, and the timestamp + random token make
/// same-name uploads land on distinct keys.
fn build_object_key(
    owner_id: &str,
    folder: Option<&str>,
    filename: &str,
    now: DateTime<Utc>,
) -> String {
    let folder = sanitize_component(folder.unwrap_or(DEFAULT_FOLDER));
    let owner = sanitize_component(owner_id);
    let name = sanitize_filename(filename);
    let token = Uuid::new_v4().simple().to_string();

    format!(
        "{}/{}/{}-{}-{}",
        folder,
        owner,
        now.timestamp_millis(),
        &token[..8],
        name
    )
}

/// Reduce a path component to `[A-Za-z0-9_-]`. Dots are excluded so a key
/// can never contain a traversal sequence.
fn sanitize_component(raw: &str) -> String {
    let mut out: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    out.truncate(64);
    if out.is_empty() {
        out.push('_');
    }
    out
}

/// Reduce a client filename to `[A-Za-z0-9._-]`, collapsing runs of
/// replaced characters and of dots, and stripping leading dots. The result
/// is a single safe path component that still resembles the original name.
fn sanitize_filename(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut last: Option<char> = None;
    for c in raw.chars() {
        let mapped = if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
            c
        } else {
            '_'
        };
        if (mapped == '_' && last == Some('_')) || (mapped == '.' && last == Some('.')) {
            continue;
        }
        out.push(mapped);
        last = Some(mapped);
    }

    let mut name = out.trim_start_matches('.').to_string();
    name.truncate(MAX_FILENAME_LEN);
    if name.is_empty() {
        name = "file".into();
    }
    name
}

/// Pull chunks until the first byte arrives; an exhausted stream means the
/// caller sent an empty body. The consumed chunk is stitched back onto the
/// front of the stream handed to the backend.
async fn reject_empty(mut body: PartBody) -> UploadResult<PartBody> {
    loop {
        match body.next().await {
            None => return Err(UploadError::EmptyPart),
            Some(Err(err)) => {
                return Err(UploadError::Internal(format!("reading part body: {}", err)));
            }
            Some(Ok(chunk)) if chunk.is_empty() => continue,
            Some(Ok(chunk)) => {
                return Ok(stream::iter(vec![Ok(chunk)]).chain(body).boxed());
            }
        }
    }
}
