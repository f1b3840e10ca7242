//! Integration tests for session expiry: expired sessions disappear from the
//! API immediately, and the sweeper reclaims their rows and staged parts.

mod common;

use axum::http::StatusCode;
use common::{TestServer, json_request, put_part};
use serde_json::json;

async fn open_session(server: &TestServer, owner: &str) -> String {
    let body = json!({
        "filename": "sample.bin",
        "contentType": "application/octet-stream",
        "fileSize": 12_582_912i64
    });
    let (status, body) =
        json_request(&server.router, "POST", "/uploads", Some(body), Some(owner)).await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["uploadId"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn expired_sessions_become_invisible() {
    let server = TestServer::new().await;
    let upload_id = open_session(&server, "alice").await;

    put_part(&server.router, "alice", &upload_id, 1, b"early".to_vec()).await;
    server.force_expire(&upload_id).await;

    // Every operation reports the same absence, even for the owner.
    let uri = format!("/uploads/status?uploadId={}", upload_id);
    let (status, body) = json_request(&server.router, "GET", &uri, None, Some("alice")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["message"], "upload session not found");

    let (status, _) = put_part(&server.router, "alice", &upload_id, 2, b"late".to_vec()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let manifest = json!({ "uploadId": upload_id.clone(), "parts": [] });
    let (status, _) = json_request(
        &server.router,
        "POST",
        "/uploads/complete",
        Some(manifest),
        Some("alice"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = json_request(
        &server.router,
        "POST",
        "/uploads/abort",
        Some(json!({ "uploadId": upload_id })),
        Some("alice"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // The row itself lingers until the sweeper runs.
    assert_eq!(server.session_rows().await, 1);
}

#[tokio::test]
async fn the_sweeper_reclaims_expired_sessions() {
    let server = TestServer::new().await;

    let stale = open_session(&server, "alice").await;
    let live = open_session(&server, "bob").await;
    put_part(&server.router, "alice", &stale, 1, b"stale".to_vec()).await;
    put_part(&server.router, "bob", &live, 1, b"live".to_vec()).await;
    server.force_expire(&stale).await;

    let staging = server.storage_dir.join("documents/.multipart");
    assert!(staging.join(&stale).exists());

    let reaped = server.state.uploads.reap_expired().await.unwrap();
    assert_eq!(reaped, 1);

    // Staged parts and the row are gone for the expired session only.
    assert!(!staging.join(&stale).exists());
    assert!(staging.join(&live).exists());
    assert_eq!(server.session_rows().await, 1);

    let uri = format!("/uploads/status?uploadId={}", live);
    let (status, view) = json_request(&server.router, "GET", &uri, None, Some("bob")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["data"]["uploadedParts"], json!([1]));

    // A second pass finds nothing left to do.
    assert_eq!(server.state.uploads.reap_expired().await.unwrap(), 0);
}
