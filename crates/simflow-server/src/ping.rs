//! Liveness and health routes mounted by every service.
//!
//! - `POST /ping` -- echo `{ "value": n }` as `{ "incremented": n + 1 }`
//! - `GET /ping/started` -- `"alive"` once the server accepts requests
//! - `GET /ping/alive` -- [`HealthStatus`] from the registry; 503 when any
//!   probe fails

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use simflow_types::{HealthStatus, PingRequest, PingResponse};

use crate::error::ApiError;
use crate::health::HealthRegistry;

/// Build the ping routes for a service of any state type.
pub fn ping_routes<S>(health: Arc<HealthRegistry>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new()
        .route("/ping", post(ping))
        .route("/ping/started", get(started))
        .route("/ping/alive", get(alive))
        .with_state(health)
}

async fn ping(
    body: Result<Json<PingRequest>, JsonRejection>,
) -> Result<Json<PingResponse>, ApiError> {
    let Json(request) = body?;
    let incremented = request
        .value
        .checked_add(1)
        .ok_or_else(|| ApiError::BadRequest("value is too large to increment".to_owned()))?;
    Ok(Json(PingResponse { incremented }))
}

async fn started() -> &'static str {
    "alive"
}

async fn alive(State(health): State<Arc<HealthRegistry>>) -> (StatusCode, Json<HealthStatus>) {
    let status = health.check().await;
    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}
