//! Resumable chunked upload relay.
//!
//! This crate provides the HTTP control plane for large-file uploads:
//! - Upload session management with passive 24 h expiry
//! - Raw-bytes part uploads, resumable and parallel-safe
//! - Completion with etag verification and atomic assembly
//! - Explicit abort plus a background sweep for abandoned sessions
//! - Post-processing notifications for completed videos

pub mod auth;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
pub mod storage;

pub use errors::{UploadError, UploadResult};
pub use state::AppState;

/// Embedded schema migrations, run at startup and by tests.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();
