//! Multipart storage backend abstraction.
//!
//! The upload service talks to storage exclusively through [`MultipartBackend`]
//! so the transfer protocol stays independent of where bytes land. The only
//! backend shipped here is [`FsBackend`], which stages parts on local disk and
//! assembles them on completion; an S3-compatible implementation would slot in
//! behind the same four calls.

pub mod filesystem;

pub use filesystem::FsBackend;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use std::io;
use thiserror::Error;

use crate::models::storage_class::StorageClass;

/// Streamed body of a single part.
pub type PartBody = BoxStream<'static, io::Result<Bytes>>;

/// Receipt for a part the backend has durably stored.
#[derive(Debug, Clone)]
pub struct StoredPart {
    /// Integrity token the caller must echo back at completion.
    pub etag: String,
    /// Bytes actually written.
    pub size: i64,
}

/// One entry of the completion manifest: which etag the caller holds for
/// which part.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartEtag {
    pub part_number: i32,
    pub etag: String,
}

#[derive(Debug, Error)]
pub enum BackendError {
    /// The multipart transaction does not exist (never initiated, already
    /// completed, or already aborted).
    #[error("multipart upload `{0}` not found")]
    UploadNotFound(String),
    /// The backend refused the request as given; retrying the same call will
    /// fail the same way.
    #[error("{0}")]
    Rejected(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Storage-side multipart upload primitives.
///
/// `initiate` issues the upload id all later calls are keyed by. Parts may be
/// uploaded in any order and re-uploaded freely; nothing is visible at the
/// object key until `complete` succeeds, and `abort` discards all staged
/// parts.
#[async_trait]
pub trait MultipartBackend: Send + Sync + 'static {
    /// Open a multipart transaction for `object_key` and return its upload id.
    async fn initiate(
        &self,
        class: StorageClass,
        object_key: &str,
        content_type: &str,
    ) -> BackendResult<String>;

    /// Store one part. Overwrites any previous upload of the same number.
    async fn upload_part(
        &self,
        class: StorageClass,
        upload_id: &str,
        part_number: i32,
        body: PartBody,
    ) -> BackendResult<StoredPart>;

    /// Assemble the staged parts into the final object and return its etag.
    ///
    /// `parts` must list each part number exactly once, in ascending order,
    /// with the etag the caller received for it; manifests that repeat or
    /// reorder parts are rejected. On any error the transaction is left open
    /// so the caller can retry or abort.
    async fn complete(
        &self,
        class: StorageClass,
        upload_id: &str,
        object_key: &str,
        parts: &[PartEtag],
    ) -> BackendResult<String>;

    /// Discard the transaction and all staged parts.
    async fn abort(&self, class: StorageClass, upload_id: &str) -> BackendResult<()>;
}
