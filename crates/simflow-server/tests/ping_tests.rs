//! Integration tests for the shared ping routes.
//!
//! Tests use Axum's `Router` directly via `tower::ServiceExt` without
//! starting a TCP server.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use simflow_db::JobRepository;
use simflow_server::{HealthRegistry, Probe, ping_routes};
use tower::ServiceExt;

fn router(health: HealthRegistry) -> Router {
    ping_routes(Arc::new(health))
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn ping_increments_value() {
    let request = Request::builder()
        .method("POST")
        .uri("/ping")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"value": 41}"#))
        .unwrap();

    let response = router(HealthRegistry::new()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["incremented"], 42);
}

#[tokio::test]
async fn ping_rejects_malformed_body() {
    let request = Request::builder()
        .method("POST")
        .uri("/ping")
        .header("content-type", "application/json")
        .body(Body::from(r#"{"value": "x"}"#))
        .unwrap();

    let response = router(HealthRegistry::new()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn started_says_alive() {
    let request = Request::get("/ping/started").body(Body::empty()).unwrap();
    let response = router(HealthRegistry::new()).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"alive");
}

#[tokio::test]
async fn alive_reports_healthy_store() {
    let health = HealthRegistry::new()
        .with_system("store", vec![Probe::Database(JobRepository::memory())]);
    let request = Request::get("/ping/alive").body(Body::empty()).unwrap();

    let response = router(health).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["healthy"], true);
    assert_eq!(json["systems"][0]["name"], "store");
}

#[tokio::test]
async fn alive_returns_503_when_a_probe_fails() {
    let health = HealthRegistry::new()
        .with_system("model", vec![Probe::http("http://127.0.0.1:1/ping/started")]);
    let request = Request::get("/ping/alive").body(Body::empty()).unwrap();

    let response = router(health).oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let json = body_json(response).await;
    assert_eq!(json["healthy"], false);
}
