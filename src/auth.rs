//! Caller identity, as established by the fronting auth layer.
//!
//! This service sits behind a reverse proxy that authenticates requests and
//! forwards the verified principal in the `x-forwarded-user` header. The
//! value is opaque here, it is only ever compared for equality against a
//! session's owner.

use axum::http::HeaderMap;

use crate::errors::{UploadError, UploadResult};

/// Header carrying the verified principal.
pub const IDENTITY_HEADER: &str = "x-forwarded-user";

/// Extract the verified caller identity from request headers.
///
/// Absent, empty, or non-UTF-8 values all reject with 401.
pub fn require_owner(headers: &HeaderMap) -> UploadResult<String> {
    let owner = headers
        .get(IDENTITY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or_default();

    if owner.is_empty() {
        return Err(UploadError::MissingIdentity);
    }

    Ok(owner.to_string())
}
