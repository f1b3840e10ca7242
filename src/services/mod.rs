//! Core services: session persistence, the upload coordinator, the
//! post-processing notifier, and the expiry sweep.

pub mod notifier;
pub mod session_store;
pub mod sweep;
pub mod upload_service;

pub use notifier::{Notifier, ProcessingNotification};
pub use session_store::{SessionStore, SqliteSessionStore};
pub use upload_service::UploadService;
