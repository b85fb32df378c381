//! REST endpoint handlers for the compute API.
//!
//! Called by dispatch, never by end users. Every endpoint is safe to call
//! again with the same input: a record that already has a result is
//! reported complete and left untouched.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/run_simulation_sync/{id}` | Compute one simulation and store it |
//! | `POST` | `/process_aggregates` | Compute a batch of aggregates |
//! | `POST` | `/process_aggregate_changes` | Compute a batch of aggregate changes |
//! | `POST` | `/simulate/economy/comparison` | Stateless baseline vs reform |
//! | `GET` | `/versions` | Model versions for every country |
//! | `GET` | `/versions/{country}` | Model versions for one country |

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use simflow_server::ApiError;
use simflow_types::{BatchOutcome, BatchRequest, Country, CountryVersions, RunOutcome};
use uuid::Uuid;
use validator::Validate;

use crate::comparison::{ComparisonRequest, ComparisonResponse, compare};
use crate::state::AppState;

/// Compute simulation `id` and write its result.
///
/// 200 when the result is set (now or before), 404 when the record or its
/// model version does not exist, 422 when the stored spec cannot run.
pub async fn run_simulation_sync(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<RunOutcome>, ApiError> {
    let Path(id) = id?;
    tracing::info!(job_id = %id, kind = "simulation", "Compute requested");
    let outcome = state.service.run_simulation(id).await?;
    Ok(Json(outcome))
}

/// Compute the listed aggregates. Per-item outcomes are in the body; the
/// call itself succeeds unless the body is malformed.
pub async fn process_aggregates(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchOutcome>, ApiError> {
    let Json(request) = body?;
    tracing::info!(kind = "aggregate", items = request.ids.len(), "Batch requested");
    Ok(Json(state.service.process_aggregates(&request.ids).await))
}

/// Compute the listed aggregate changes.
pub async fn process_aggregate_changes(
    State(state): State<Arc<AppState>>,
    body: Result<Json<BatchRequest>, JsonRejection>,
) -> Result<Json<BatchOutcome>, ApiError> {
    let Json(request) = body?;
    tracing::info!(kind = "aggregate_change", items = request.ids.len(), "Batch requested");
    Ok(Json(state.service.process_aggregate_changes(&request.ids).await))
}

/// Run a baseline and a reform side by side without storing anything.
pub async fn economy_comparison(
    State(state): State<Arc<AppState>>,
    body: Result<Json<ComparisonRequest>, JsonRejection>,
) -> Result<Json<ComparisonResponse>, ApiError> {
    let Json(request) = body?;
    request.validate()?;
    let response = compare(&state.service, &request).await?;
    Ok(Json(response))
}

/// Model versions for every country.
pub async fn list_versions(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, CountryVersions>> {
    Json(state.service.registry().all())
}

/// Model versions for one country.
pub async fn country_versions(
    State(state): State<Arc<AppState>>,
    Path(country): Path<String>,
) -> Result<Json<CountryVersions>, ApiError> {
    country
        .parse::<Country>()
        .ok()
        .and_then(|c| state.service.registry().versions(c))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no models registered for country {country}")))
}
