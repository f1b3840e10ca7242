//! Upload session rows as stored in SQLite.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use crate::models::storage_class::StorageClass;

/// A resumable upload session.
///
/// Created at initiation and kept until completion, abort, or expiry. The
/// part plan (`chunk_size`, `total_parts`) is fixed for the lifetime of the
/// session; uploaded parts accumulate in their own table keyed by
/// `(upload_id, part_number)`.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct UploadSession {
    /// Backend-issued identifier for the multipart transaction.
    pub upload_id: String,
    /// Destination key the assembled object will live under.
    pub object_key: String,
    /// Bucket the object is routed to, derived from the content type.
    pub storage_class: StorageClass,
    /// Identity that initiated the upload. Only this principal may touch it.
    pub owner_id: String,
    /// Client-supplied filename, pre-sanitization.
    pub filename: String,
    /// Declared MIME type.
    pub content_type: String,
    /// Declared size of the whole file in bytes.
    pub total_size: i64,
    /// Effective chunk size in bytes after the minimum was applied.
    pub chunk_size: i64,
    /// Number of parts the client is expected to upload.
    pub total_parts: i32,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// Sessions past this instant are treated as if they never existed.
    pub expires_at: DateTime<Utc>,
}

/// A single uploaded part within a session.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct UploadedPart {
    pub upload_id: String,
    /// 1-based part index within the session's plan.
    pub part_number: i32,
    /// Backend receipt for the part, echoed back at completion.
    pub etag: String,
    pub uploaded_at: DateTime<Utc>,
}
