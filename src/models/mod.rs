//! Core data models for the resumable upload service.
//!
//! These entities describe one in-progress multipart upload and the parts
//! recorded against it. They map cleanly to database rows via
//! `sqlx::FromRow` and serialize naturally as JSON via `serde`.

pub mod session;
pub mod storage_class;
