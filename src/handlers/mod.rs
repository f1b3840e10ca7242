//! HTTP handlers.

pub mod health_handlers;
pub mod upload_handlers;

use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};

/// Wrap response data in the standard success envelope.
pub fn envelope<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}
