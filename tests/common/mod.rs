//! Common test utilities and fixtures.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;

use upload_relay::AppState;
use upload_relay::services::notifier::{Notifier, ProcessingNotification};
use upload_relay::services::session_store::SqliteSessionStore;
use upload_relay::services::upload_service::UploadService;
use upload_relay::storage::FsBackend;

/// Identity header the auth proxy would normally inject.
#[allow(dead_code)]
pub const IDENTITY_HEADER: &str = "x-forwarded-user";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub storage_dir: PathBuf,
    /// Receiving half of the notification channel; tests assert on it
    /// instead of spawning a drain task.
    pub notifications: mpsc::Receiver<ProcessingNotification>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server with temporary storage and an in-memory
    /// session store.
    pub async fn new() -> Self {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let storage_dir = temp_dir.path().join("objects");
        std::fs::create_dir_all(&storage_dir).expect("Failed to create storage directory");

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to open in-memory database");
        upload_relay::MIGRATOR
            .run(&pool)
            .await
            .expect("Failed to run migrations");
        let db = Arc::new(pool);

        let sessions = Arc::new(SqliteSessionStore::new(db.clone()));
        let backend = Arc::new(FsBackend::new(&storage_dir));
        let (notifier, notifications) = Notifier::channel(16);
        let uploads = UploadService::new(
            sessions,
            backend,
            notifier,
            "http://localhost:3000/files",
        );

        let state = AppState {
            uploads,
            db,
            storage_dir: storage_dir.clone(),
        };
        let router = upload_relay::routes::routes::routes().with_state(state.clone());

        Self {
            router,
            state,
            storage_dir,
            notifications,
            _temp_dir: temp_dir,
        }
    }

    /// Rewrite a session's expiry so it is already in the past.
    pub async fn force_expire(&self, upload_id: &str) {
        sqlx::query("UPDATE upload_sessions SET expires_at = ? WHERE upload_id = ?")
            .bind(chrono::Utc::now() - chrono::Duration::hours(1))
            .bind(upload_id)
            .execute(&*self.state.db)
            .await
            .expect("Failed to expire session");
    }

    /// Count rows still in the session table, expired or not.
    pub async fn session_rows(&self) -> i64 {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM upload_sessions")
            .fetch_one(&*self.state.db)
            .await
            .expect("Failed to count sessions")
    }
}

/// Make a JSON request (or a bodyless one) against the router.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub async fn json_request(
    router: &axum::Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    owner: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);

    if let Some(owner) = owner {
        builder = builder.header(IDENTITY_HEADER, owner);
    }

    let body = match body {
        Some(v) => {
            builder = builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&v).unwrap())
        }
        None => Body::empty(),
    };

    let request = builder.body(body).unwrap();
    let response = router.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();

    let json: Value = if body_bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
    };

    (status, json)
}

/// Upload one raw-bytes part through the HTTP surface.
#[allow(dead_code)]
pub async fn put_part(
    router: &axum::Router,
    owner: &str,
    upload_id: &str,
    part_number: i32,
    bytes: Vec<u8>,
) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("PUT")
        .uri("/uploads/part")
        .header(IDENTITY_HEADER, owner)
        .header("x-upload-id", upload_id)
        .header("x-part-number", part_number.to_string())
        .header("Content-Type", "application/octet-stream")
        .body(Body::from(bytes))
        .unwrap();

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

    (status, json)
}
