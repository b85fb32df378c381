//! REST endpoint handlers for the creation API.
//!
//! Creation endpoints validate the spec, store a pending record with a null
//! result, and return at once with a poll URL. Nothing here computes a
//! result; that is the compute API's job once dispatch picks the record up.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/simulations` | Submit a simulation |
//! | `GET` | `/simulations` | List simulations (`?status=&skip=&limit=`) |
//! | `GET` | `/simulations/{id}` | Simulation with result (null until complete) |
//! | `GET` | `/simulations/{id}/status` | Status only |
//! | `POST` | `/aggregates` | Submit an aggregate over a simulation |
//! | `POST` | `/aggregates/bulk` | Submit several aggregates at once |
//! | `GET` | `/aggregates` | List aggregates (also `?simulation_id=`) |
//! | `POST` | `/aggregate-changes` | Submit an aggregate change between two simulations |
//! | `POST` | `/aggregate-changes/bulk` | Submit several aggregate changes at once |
//! | `GET` | `/aggregate-changes` | List aggregate changes (also `?baseline_simulation_id=&comparison_simulation_id=`) |
//! | `GET` | `/versions` | Model versions for every country |
//! | `GET` | `/versions/{country}` | Model versions for one country |
//!
//! Aggregates and aggregate changes have the same `GET {id}` routes as
//! simulations. A bulk submission stores every item or none of them.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use simflow_core::PolicyParameters;
use simflow_db::ListFilter;
use simflow_server::ApiError;
use simflow_types::{
    Aggregate, AggregateChange, AggregateChangeSpec, AggregateSpec, Country, CountryVersions,
    JobCreated, JobKind, JobRecord, JobStatus, JobStatusView, Simulation, SimulationId,
    SimulationSpec,
};
use uuid::Uuid;
use validator::Validate;

use crate::state::AppState;

/// Records returned by a list call when `limit` is absent.
const DEFAULT_LIST_LIMIT: u32 = 100;

/// Upper bound on `limit`.
const MAX_LIST_LIMIT: u32 = 1000;

/// Most items accepted by one bulk submission.
const MAX_BULK_ITEMS: usize = 1000;

// ---------------------------------------------------------------------------
// Query parameter structs
// ---------------------------------------------------------------------------

/// Query parameters for the list endpoints.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    /// Only records in this status (`pending`, `in_progress`, `complete`,
    /// `failed`).
    pub status: Option<String>,
    /// Records to skip before the first one returned.
    pub skip: Option<u32>,
    /// Maximum number of records (default 100, max 1000).
    pub limit: Option<u32>,
    /// Aggregates only: records over this simulation.
    pub simulation_id: Option<Uuid>,
    /// Aggregate changes only: records with this baseline.
    pub baseline_simulation_id: Option<Uuid>,
    /// Aggregate changes only: records with this comparison.
    pub comparison_simulation_id: Option<Uuid>,
}

impl ListQuery {
    fn status(&self) -> Result<Option<JobStatus>, ApiError> {
        self.status
            .as_deref()
            .map(str::parse::<JobStatus>)
            .transpose()
            .map_err(|e| ApiError::BadRequest(e.to_string()))
    }

    fn limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIST_LIMIT).clamp(1, MAX_LIST_LIMIT)
    }

    /// Store filter for `kind`. A source filter on a kind that has no such
    /// field is a 400.
    fn filter(&self, kind: JobKind) -> Result<ListFilter, ApiError> {
        let sources = [
            ("simulation_id", self.simulation_id, kind == JobKind::Aggregate),
            (
                "baseline_simulation_id",
                self.baseline_simulation_id,
                kind == JobKind::AggregateChange,
            ),
            (
                "comparison_simulation_id",
                self.comparison_simulation_id,
                kind == JobKind::AggregateChange,
            ),
        ];

        let mut filter = ListFilter::first(self.limit()).skipping(self.skip.unwrap_or(0));
        if let Some(status) = self.status()? {
            filter = filter.with_status(status);
        }
        for (field, id, applies) in sources {
            let Some(id) = id else { continue };
            if !applies {
                return Err(ApiError::BadRequest(format!(
                    "{field} is not a filter for {kind} records"
                )));
            }
            filter = filter.with_spec_id(field, id);
        }
        Ok(filter)
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

async fn insert<T: serde::Serialize>(
    state: &AppState,
    kind: JobKind,
    spec: &T,
) -> Result<(StatusCode, Json<JobCreated>), ApiError> {
    let value = serde_json::to_value(spec).map_err(|e| ApiError::Internal(e.to_string()))?;
    let record = state.repository.insert(kind, value).await?;

    tracing::info!(job_id = %record.id, kind = %kind, "Accepted new record");

    Ok((
        StatusCode::CREATED,
        Json(JobCreated {
            id: record.id,
            kind,
            status: record.status,
            poll_url: format!("/{}/{}", kind.path(), record.id),
        }),
    ))
}

async fn insert_bulk<T: serde::Serialize>(
    state: &AppState,
    kind: JobKind,
    specs: &[T],
) -> Result<(StatusCode, Json<Vec<JobCreated>>), ApiError> {
    let values = specs
        .iter()
        .map(serde_json::to_value)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let records = state.repository.insert_many(kind, values).await?;

    tracing::info!(kind = %kind, count = records.len(), "Accepted bulk submission");

    let created = records
        .into_iter()
        .map(|record| JobCreated {
            id: record.id,
            kind,
            status: record.status,
            poll_url: format!("/{}/{}", kind.path(), record.id),
        })
        .collect();
    Ok((StatusCode::CREATED, Json(created)))
}

/// Reject an empty or oversized batch, and validate every item.
fn validate_bulk<T: Validate>(specs: &[T]) -> Result<(), ApiError> {
    if specs.is_empty() {
        return Err(ApiError::BadRequest("bulk submission is empty".to_owned()));
    }
    if specs.len() > MAX_BULK_ITEMS {
        return Err(ApiError::BadRequest(format!(
            "bulk submission has {} items, at most {MAX_BULK_ITEMS} allowed",
            specs.len()
        )));
    }
    for (index, spec) in specs.iter().enumerate() {
        spec.validate()
            .map_err(|e| ApiError::BadRequest(format!("item {index}: validation failed: {e}")))?;
    }
    Ok(())
}

async fn fetch(state: &AppState, kind: JobKind, id: Uuid) -> Result<JobRecord, ApiError> {
    state
        .repository
        .get(kind, id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("{kind} {id} not found")))
}

async fn view<V>(state: &AppState, kind: JobKind, id: Uuid) -> Result<Json<V>, ApiError>
where
    V: TryFrom<JobRecord, Error = serde_json::Error>,
{
    let record = fetch(state, kind, id).await?;
    V::try_from(record)
        .map(Json)
        .map_err(|e| ApiError::Internal(format!("stored {kind} {id} is unreadable: {e}")))
}

async fn list<V>(state: &AppState, kind: JobKind, query: &ListQuery) -> Result<Json<Vec<V>>, ApiError>
where
    V: TryFrom<JobRecord, Error = serde_json::Error>,
{
    let records = state.repository.list(kind, &query.filter(kind)?).await?;
    records
        .into_iter()
        .map(V::try_from)
        .collect::<Result<Vec<_>, _>>()
        .map(Json)
        .map_err(|e| ApiError::Internal(format!("stored {kind} is unreadable: {e}")))
}

async fn status(state: &AppState, kind: JobKind, id: Uuid) -> Result<Json<JobStatusView>, ApiError> {
    let record = fetch(state, kind, id).await?;
    Ok(Json(JobStatusView {
        id: record.id,
        kind,
        status: record.status,
        has_result: record.has_result(),
        error: record.error,
    }))
}

async fn require_simulation(state: &AppState, id: SimulationId) -> Result<(), ApiError> {
    state
        .repository
        .get(JobKind::Simulation, id.into_inner())
        .await?
        .map(|_| ())
        .ok_or_else(|| ApiError::NotFound(format!("simulation {id} not found")))
}

// ---------------------------------------------------------------------------
// Simulations
// ---------------------------------------------------------------------------

/// Submit a simulation.
///
/// The model version is resolved here so the stored spec names a concrete
/// version; an unknown version or policy parameter is a 400.
pub async fn create_simulation(
    State(state): State<Arc<AppState>>,
    body: Result<Json<SimulationSpec>, JsonRejection>,
) -> Result<(StatusCode, Json<JobCreated>), ApiError> {
    let Json(mut spec) = body?;
    spec.validate()?;

    let version = state
        .registry
        .resolve(spec.country, spec.model_version.as_deref())
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    PolicyParameters::with_overrides(spec.country, &spec.policy)
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    spec.model_version = Some(version);

    insert(&state, JobKind::Simulation, &spec).await
}

/// List simulations, newest first.
pub async fn list_simulations(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Simulation>>, ApiError> {
    let Query(query) = query?;
    list(&state, JobKind::Simulation, &query).await
}

/// Get one simulation.
pub async fn get_simulation(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Simulation>, ApiError> {
    let Path(id) = id?;
    view(&state, JobKind::Simulation, id).await
}

/// Status of one simulation.
pub async fn simulation_status(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<JobStatusView>, ApiError> {
    let Path(id) = id?;
    status(&state, JobKind::Simulation, id).await
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Submit an aggregate. The referenced simulation must exist but need not
/// be complete.
pub async fn create_aggregate(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AggregateSpec>, JsonRejection>,
) -> Result<(StatusCode, Json<JobCreated>), ApiError> {
    let Json(spec) = body?;
    spec.validate()?;
    require_simulation(&state, spec.simulation_id).await?;
    insert(&state, JobKind::Aggregate, &spec).await
}

/// Submit several aggregates. Every referenced simulation must exist.
pub async fn create_aggregates_bulk(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Vec<AggregateSpec>>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<JobCreated>>), ApiError> {
    let Json(specs) = body?;
    validate_bulk(&specs)?;
    let simulations: BTreeSet<SimulationId> = specs.iter().map(|s| s.simulation_id).collect();
    for id in simulations {
        require_simulation(&state, id).await?;
    }
    insert_bulk(&state, JobKind::Aggregate, &specs).await
}

/// List aggregates, newest first.
pub async fn list_aggregates(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<Aggregate>>, ApiError> {
    let Query(query) = query?;
    list(&state, JobKind::Aggregate, &query).await
}

/// Get one aggregate.
pub async fn get_aggregate(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Aggregate>, ApiError> {
    let Path(id) = id?;
    view(&state, JobKind::Aggregate, id).await
}

/// Status of one aggregate.
pub async fn aggregate_status(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<JobStatusView>, ApiError> {
    let Path(id) = id?;
    status(&state, JobKind::Aggregate, id).await
}

// ---------------------------------------------------------------------------
// Aggregate changes
// ---------------------------------------------------------------------------

/// Submit an aggregate change. Both simulations must exist.
pub async fn create_aggregate_change(
    State(state): State<Arc<AppState>>,
    body: Result<Json<AggregateChangeSpec>, JsonRejection>,
) -> Result<(StatusCode, Json<JobCreated>), ApiError> {
    let Json(spec) = body?;
    spec.validate()?;
    require_simulation(&state, spec.baseline_simulation_id).await?;
    require_simulation(&state, spec.comparison_simulation_id).await?;
    insert(&state, JobKind::AggregateChange, &spec).await
}

/// Submit several aggregate changes. Every referenced simulation must
/// exist.
pub async fn create_aggregate_changes_bulk(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Vec<AggregateChangeSpec>>, JsonRejection>,
) -> Result<(StatusCode, Json<Vec<JobCreated>>), ApiError> {
    let Json(specs) = body?;
    validate_bulk(&specs)?;
    let simulations: BTreeSet<SimulationId> = specs
        .iter()
        .flat_map(|s| [s.baseline_simulation_id, s.comparison_simulation_id])
        .collect();
    for id in simulations {
        require_simulation(&state, id).await?;
    }
    insert_bulk(&state, JobKind::AggregateChange, &specs).await
}

/// List aggregate changes, newest first.
pub async fn list_aggregate_changes(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ListQuery>, QueryRejection>,
) -> Result<Json<Vec<AggregateChange>>, ApiError> {
    let Query(query) = query?;
    list(&state, JobKind::AggregateChange, &query).await
}

/// Get one aggregate change.
pub async fn get_aggregate_change(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<AggregateChange>, ApiError> {
    let Path(id) = id?;
    view(&state, JobKind::AggregateChange, id).await
}

/// Status of one aggregate change.
pub async fn aggregate_change_status(
    State(state): State<Arc<AppState>>,
    id: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<JobStatusView>, ApiError> {
    let Path(id) = id?;
    status(&state, JobKind::AggregateChange, id).await
}

// ---------------------------------------------------------------------------
// Model versions
// ---------------------------------------------------------------------------

/// Model versions for every country, keyed by country code.
pub async fn list_versions(
    State(state): State<Arc<AppState>>,
) -> Json<BTreeMap<String, CountryVersions>> {
    Json(state.registry.all())
}

/// Model versions for one country.
pub async fn country_versions(
    State(state): State<Arc<AppState>>,
    Path(country): Path<String>,
) -> Result<Json<CountryVersions>, ApiError> {
    country
        .parse::<Country>()
        .ok()
        .and_then(|c| state.registry.versions(c))
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("no models registered for country {country}")))
}
