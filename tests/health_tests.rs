//! Integration tests for the liveness and readiness probes.

mod common;

use axum::http::StatusCode;
use common::{TestServer, json_request};

#[tokio::test]
async fn healthz_is_always_ok() {
    let server = TestServer::new().await;

    let (status, body) = json_request(&server.router, "GET", "/healthz", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn readyz_reports_green_checks() {
    let server = TestServer::new().await;

    let (status, body) = json_request(&server.router, "GET", "/readyz", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["checks"]["sqlite"]["ok"], true);
    assert_eq!(body["checks"]["disk"]["ok"], true);
}

#[tokio::test]
async fn readyz_fails_when_the_storage_root_is_gone() {
    let server = TestServer::new().await;

    std::fs::remove_dir_all(&server.storage_dir).unwrap();

    let (status, body) = json_request(&server.router, "GET", "/readyz", None, None).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "error");
    assert_eq!(body["checks"]["disk"]["ok"], false);
    assert_eq!(body["checks"]["sqlite"]["ok"], true);
}
