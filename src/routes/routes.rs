//! Defines routes for the upload lifecycle and health probes.
//!
//! ## Structure
//! - **Upload endpoints**
//!   - `POST /uploads`          — initiate a resumable upload session
//!   - `PUT  /uploads/part`     — upload one part (raw bytes; `x-upload-id`
//!     and `x-part-number` headers identify it)
//!   - `POST /uploads/complete` — assemble the final object
//!   - `POST /uploads/abort`    — discard an open upload
//!   - `GET  /uploads/status`   — resume view (`?uploadId=...`)
//!
//! - **Health endpoints**
//!   - `GET /healthz` — liveness
//!   - `GET /readyz`  — readiness (store query + disk probe)
//!
//! Every upload endpoint expects the verified caller identity in the
//! `x-forwarded-user` header.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::{
            abort_upload, complete_upload, initiate_upload, upload_part, upload_status,
        },
    },
    state::AppState,
};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Build and return the router for all upload routes.
///
/// The router carries shared state (`AppState`) to all handlers.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        // upload lifecycle
        .route("/uploads", post(initiate_upload))
        .route("/uploads/part", put(upload_part))
        .route("/uploads/complete", post(complete_upload))
        .route("/uploads/abort", post(abort_upload))
        .route("/uploads/status", get(upload_status))
}
