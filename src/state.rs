//! Application state shared across handlers.

use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;

use crate::services::upload_service::UploadService;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Upload lifecycle coordinator.
    pub uploads: UploadService,
    /// Pool handle, kept alongside the service for readiness probes.
    pub db: Arc<SqlitePool>,
    /// Storage root, probed for writability by `readyz`.
    pub storage_dir: PathBuf,
}
