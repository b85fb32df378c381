//! Integration tests for the compute API endpoints.
//!
//! Requests go through the router with `tower::ServiceExt`; records are
//! seeded straight into the in-memory store the service shares.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::post;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{Value, json};
use simflow_compute::{AppState, ComputeService, ModelBackend, RemoteModel, build_router};
use simflow_core::ModelRegistry;
use simflow_db::JobRepository;
use simflow_types::{JobKind, JobStatus};
use tower::ServiceExt;
use uuid::Uuid;

fn make_state(backend: ModelBackend) -> Arc<AppState> {
    Arc::new(AppState::new(ComputeService::new(
        JobRepository::memory(),
        ModelRegistry::default(),
        backend,
    )))
}

fn decimal(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn post_json(router: &Router, uri: &str, body: &Value) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

async fn run(router: &Router, id: Uuid) -> (StatusCode, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::post(format!("/run_simulation_sync/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

fn simulation_spec(version: Option<&str>) -> Value {
    let mut spec = json!({
        "country": "us",
        "households": [
            { "id": "a", "employment_income": "24600" },
            { "id": "b", "employment_income": "64600", "weight": "3" }
        ]
    });
    if let Some(version) = version {
        spec["model_version"] = json!(version);
    }
    spec
}

async fn seed(state: &AppState, kind: JobKind, spec: Value) -> Uuid {
    state.service.repository().insert(kind, spec).await.unwrap().id
}

async fn stored(state: &AppState, kind: JobKind, id: Uuid) -> simflow_types::JobRecord {
    state
        .service
        .repository()
        .get(kind, id)
        .await
        .unwrap()
        .unwrap()
}

// =============================================================================
// Simulations
// =============================================================================

#[tokio::test]
async fn test_run_simulation_sets_result() {
    let state = make_state(ModelBackend::default());
    let router = build_router(Arc::clone(&state));
    let id = seed(&state, JobKind::Simulation, simulation_spec(None)).await;

    let (status, json) = run(&router, id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "complete");

    let record = stored(&state, JobKind::Simulation, id).await;
    assert_eq!(record.status, JobStatus::Complete);
    let result = record.result.unwrap();
    assert_eq!(result["model_version"], "1.370.2");
    assert_eq!(result["households"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let state = make_state(ModelBackend::default());
    let router = build_router(Arc::clone(&state));
    let id = seed(&state, JobKind::Simulation, simulation_spec(None)).await;

    run(&router, id).await;
    let first = stored(&state, JobKind::Simulation, id).await;

    let (status, json) = run(&router, id).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["message"], "already complete");

    let second = stored(&state, JobKind::Simulation, id).await;
    assert_eq!(first.result, second.result);
    assert_eq!(first.completed_at, second.completed_at);
}

#[tokio::test]
async fn test_unknown_model_version_is_404_with_code() {
    let state = make_state(ModelBackend::default());
    let router = build_router(Arc::clone(&state));
    let id = seed(&state, JobKind::Simulation, simulation_spec(Some("0.0.0"))).await;

    let (status, json) = run(&router, id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "model_version_not_found");

    let record = stored(&state, JobKind::Simulation, id).await;
    assert_eq!(record.status, JobStatus::Failed);
    assert!(record.result.is_none());
}

#[tokio::test]
async fn test_missing_record_is_404() {
    let router = build_router(make_state(ModelBackend::default()));
    let (status, json) = run(&router, Uuid::now_v7()).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "record_not_found");
}

#[tokio::test]
async fn test_stored_spec_with_bad_parameter_is_422() {
    let state = make_state(ModelBackend::default());
    let router = build_router(Arc::clone(&state));
    let mut spec = simulation_spec(None);
    spec["policy"] = json!({ "income_tax.rate": "1.5" });
    let id = seed(&state, JobKind::Simulation, spec).await;

    let (status, _) = run(&router, id).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn test_process_aggregates_defers_then_completes() {
    let state = make_state(ModelBackend::default());
    let router = build_router(Arc::clone(&state));
    let sim = seed(&state, JobKind::Simulation, simulation_spec(None)).await;
    let agg = seed(
        &state,
        JobKind::Aggregate,
        json!({ "simulation_id": sim, "variable": "income_tax", "function": "sum" }),
    )
    .await;
    let body = json!({ "ids": [agg] });

    let (status, json) = post_json(&router, "/process_aggregates", &body).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["deferred"][0], agg.to_string());

    run(&router, sim).await;
    let (_, json) = post_json(&router, "/process_aggregates", &body).await;
    assert_eq!(json["completed"][0], agg.to_string());

    // (24600 - 14600) * 0.2 + 3 * (64600 - 14600) * 0.2
    let record = stored(&state, JobKind::Aggregate, agg).await;
    assert_eq!(decimal(&record.result.unwrap()["value"]), dec!(32000));
}

#[tokio::test]
async fn test_process_aggregate_changes_reports_missing_as_terminal() {
    let router = build_router(make_state(ModelBackend::default()));
    let missing = Uuid::now_v7();
    let (status, json) = post_json(
        &router,
        "/process_aggregate_changes",
        &json!({ "ids": [missing] }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["failed"][0]["id"], missing.to_string());
    assert_eq!(json["failed"][0]["terminal"], true);
}

#[tokio::test]
async fn test_malformed_batch_is_400() {
    let router = build_router(make_state(ModelBackend::default()));
    let (status, _) = post_json(&router, "/process_aggregates", &json!({ "ids": "x" })).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Comparison, versions, ping
// =============================================================================

#[tokio::test]
async fn test_economy_comparison() {
    let router = build_router(make_state(ModelBackend::default()));
    let mut reform = simulation_spec(None);
    reform["policy"] = json!({ "benefit.basic_amount": "100" });

    let (status, json) = post_json(
        &router,
        "/simulate/economy/comparison",
        &json!({ "baseline": simulation_spec(None), "reform": reform }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["model_version"], "1.370.2");
    // No taper, so all 4 weighted households keep the full 100.
    assert_eq!(decimal(&json["budget_change"]), dec!(-400));
    assert_eq!(decimal(&json["net_income_change"]), dec!(400));
}

#[tokio::test]
async fn test_versions() {
    let router = build_router(make_state(ModelBackend::default()));
    let response = router
        .clone()
        .oneshot(Request::get("/versions/us").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["latest"], "1.370.2");
}

#[tokio::test]
async fn test_ping_increments() {
    let router = build_router(make_state(ModelBackend::default()));
    let (status, json) = post_json(&router, "/ping", &json!({ "value": 41 })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["incremented"], 42);
}

// =============================================================================
// Remote model backend
// =============================================================================

async fn spawn_model_stub(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn test_remote_404_marks_model_version_not_found() {
    let stub = Router::new().route(
        "/simulate",
        post(|| async { (StatusCode::NOT_FOUND, "no such version") }),
    );
    let url = spawn_model_stub(stub).await;
    let backend = ModelBackend::Remote(RemoteModel::new(&url, Duration::from_secs(5)).unwrap());
    let state = make_state(backend);
    let router = build_router(Arc::clone(&state));
    let id = seed(&state, JobKind::Simulation, simulation_spec(None)).await;

    let (status, json) = run(&router, id).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["code"], "model_version_not_found");
    assert_eq!(
        stored(&state, JobKind::Simulation, id).await.status,
        JobStatus::Failed
    );
}

#[tokio::test]
async fn test_remote_500_leaves_record_claimable() {
    let stub = Router::new().route(
        "/simulate",
        post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let url = spawn_model_stub(stub).await;
    let backend = ModelBackend::Remote(RemoteModel::new(&url, Duration::from_secs(5)).unwrap());
    let state = make_state(backend);
    let router = build_router(Arc::clone(&state));
    let id = seed(&state, JobKind::Simulation, simulation_spec(None)).await;

    let (status, _) = run(&router, id).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        stored(&state, JobKind::Simulation, id).await.status,
        JobStatus::Pending
    );
}
