//! Local-disk multipart backend.
//!
//! Parts are staged beneath `{root}/{bucket}/.multipart/{upload_id}/` as one
//! file per part number, each named so a directory listing sorts in part
//! order. Completion streams the staged parts into a temporary file in the
//! final object's directory, verifies each caller-supplied etag against the
//! bytes actually on disk, then renames the assembled file into place.
//! Nothing is visible at the object key until that rename.

use bytes::Bytes;
use futures::{StreamExt, pin_mut};
use md5::Context;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

use super::{BackendError, BackendResult, MultipartBackend, PartBody, PartEtag, StoredPart};
use crate::models::storage_class::StorageClass;

const MAX_OBJECT_KEY_LEN: usize = 1024;
const STAGING_DIR: &str = ".multipart";

/// Multipart backend storing everything under a single root directory.
#[derive(Clone, Debug)]
pub struct FsBackend {
    root: PathBuf,
}

impl FsBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn bucket_root(&self, class: StorageClass) -> PathBuf {
        self.root.join(class.bucket())
    }

    fn staging_dir(&self, class: StorageClass, upload_id: &str) -> PathBuf {
        self.bucket_root(class).join(STAGING_DIR).join(upload_id)
    }

    fn object_path(&self, class: StorageClass, key: &str) -> PathBuf {
        self.bucket_root(class).join(key)
    }

    /// Resolve an upload id to its staging directory, or fail if the
    /// transaction was never initiated (or already finished).
    async fn open_staging(
        &self,
        class: StorageClass,
        upload_id: &str,
    ) -> BackendResult<PathBuf> {
        ensure_component_safe(upload_id)?;
        let staging = self.staging_dir(class, upload_id);
        match fs::metadata(&staging).await {
            Ok(_) => Ok(staging),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                Err(BackendError::UploadNotFound(upload_id.to_string()))
            }
            Err(err) => Err(BackendError::Io(err)),
        }
    }

    /// Stream every staged part into `out` in manifest order, verifying each
    /// caller-supplied etag against the bytes on disk. Returns the S3-style
    /// assembled etag (md5 over the concatenated part digests).
    async fn assemble_parts(
        &self,
        out: &mut File,
        staging: &Path,
        parts: &[PartEtag],
    ) -> BackendResult<String> {
        let mut combined = Context::new();

        for part in parts {
            let part_path = staging.join(part_file_name(part.part_number));
            let file = match File::open(&part_path).await {
                Ok(file) => file,
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    return Err(BackendError::Rejected(format!(
                        "part {} was never uploaded",
                        part.part_number
                    )));
                }
                Err(err) => return Err(BackendError::Io(err)),
            };

            let mut digest = Context::new();
            let stream = ReaderStream::new(file);
            pin_mut!(stream);
            while let Some(chunk_res) = stream.next().await {
                let chunk: Bytes = chunk_res?;
                digest.consume(&chunk);
                out.write_all(&chunk).await?;
            }

            let digest = digest.compute();
            let actual = format!("{:x}", digest);
            if actual != part.etag {
                return Err(BackendError::Rejected(format!(
                    "etag mismatch for part {}: expected {}, stored bytes hash to {}",
                    part.part_number, part.etag, actual
                )));
            }
            combined.consume(digest.0);
        }

        Ok(format!("{:x}-{}", combined.compute(), parts.len()))
    }
}

#[async_trait::async_trait]
impl MultipartBackend for FsBackend {
    async fn initiate(
        &self,
        class: StorageClass,
        object_key: &str,
        content_type: &str,
    ) -> BackendResult<String> {
        ensure_key_safe(object_key)?;

        let upload_id = Uuid::new_v4().to_string();
        let staging = self.staging_dir(class, &upload_id);
        fs::create_dir_all(&staging).await?;

        debug!(
            "initiated multipart upload {} for {} ({})",
            upload_id, object_key, content_type
        );
        Ok(upload_id)
    }

    async fn upload_part(
        &self,
        class: StorageClass,
        upload_id: &str,
        part_number: i32,
        body: PartBody,
    ) -> BackendResult<StoredPart> {
        let staging = self.open_staging(class, upload_id).await?;

        let tmp_path = staging.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size: i64 = 0;
        let mut digest = Context::new();
        let mut body = body;
        while let Some(chunk_res) = body.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(BackendError::Io(err));
                }
            };
            size += chunk.len() as i64;
            digest.consume(&chunk);
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BackendError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BackendError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BackendError::Io(err));
        }

        // Re-uploading a part replaces the previous attempt wholesale.
        let part_path = staging.join(part_file_name(part_number));
        if let Err(err) = fs::rename(&tmp_path, &part_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&part_path).await?;
                fs::rename(&tmp_path, &part_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BackendError::Io(err));
            }
        }

        Ok(StoredPart {
            etag: format!("{:x}", digest.compute()),
            size,
        })
    }

    async fn complete(
        &self,
        class: StorageClass,
        upload_id: &str,
        object_key: &str,
        parts: &[PartEtag],
    ) -> BackendResult<String> {
        ensure_key_safe(object_key)?;
        if parts.is_empty() {
            return Err(BackendError::Rejected("empty completion manifest".into()));
        }
        // A duplicate entry would pass a pure length check while another
        // part went missing, so the manifest must be strictly increasing.
        if parts.windows(2).any(|w| w[0].part_number >= w[1].part_number) {
            return Err(BackendError::Rejected(
                "manifest part numbers must be strictly increasing".into(),
            ));
        }
        let staging = self.open_staging(class, upload_id).await?;

        let final_path = self.object_path(class, object_key);
        let parent = final_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            BackendError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut out = File::create(&tmp_path).await?;

        let etag = match self.assemble_parts(&mut out, &staging, parts).await {
            Ok(etag) => etag,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(err);
            }
        };

        if let Err(err) = out.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BackendError::Io(err));
        }
        if let Err(err) = out.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(BackendError::Io(err));
        }

        if let Err(err) = fs::rename(&tmp_path, &final_path).await {
            if err.kind() == ErrorKind::AlreadyExists {
                fs::remove_file(&final_path).await?;
                fs::rename(&tmp_path, &final_path).await?;
            } else {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(BackendError::Io(err));
            }
        }

        if let Err(err) = fs::remove_dir_all(&staging).await {
            debug!(
                "failed to remove staging directory {} after completion: {}",
                staging.display(),
                err
            );
        }

        Ok(etag)
    }

    async fn abort(&self, class: StorageClass, upload_id: &str) -> BackendResult<()> {
        let staging = self.open_staging(class, upload_id).await?;
        fs::remove_dir_all(&staging).await?;
        debug!("aborted multipart upload {}", upload_id);
        Ok(())
    }
}

fn part_file_name(part_number: i32) -> String {
    format!("{:05}.part", part_number)
}

/// Basic key validation to avoid trivial path traversal vectors.
///
/// Rejects keys that are empty, oversized, absolute, contain `..`, or carry
/// control characters. Keys are built server-side from sanitized input, so
/// this is a backstop rather than the primary defense.
fn ensure_key_safe(key: &str) -> BackendResult<()> {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(BackendError::Rejected("invalid object key".into()));
    }
    if key.starts_with('/') || key.contains("..") {
        return Err(BackendError::Rejected("invalid object key".into()));
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(BackendError::Rejected("invalid object key".into()));
    }
    Ok(())
}

/// Upload ids become single path components, so they must not contain
/// separators or traversal sequences.
fn ensure_component_safe(value: &str) -> BackendResult<()> {
    if value.is_empty()
        || value.contains('/')
        || value.contains('\\')
        || value.contains("..")
        || value.bytes().any(|b| b.is_ascii_control())
    {
        return Err(BackendError::Rejected("invalid upload id".into()));
    }
    Ok(())
}
