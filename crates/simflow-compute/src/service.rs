//! Compute logic behind the compute API.
//!
//! Every operation is safe to repeat. A record whose result is already set
//! is reported complete without recomputing, and the final write goes
//! through [`JobRepository::complete`], which refuses to overwrite. Two
//! concurrent runs of the same record may both compute, but only the first
//! value is stored and the model is deterministic, so both report the same
//! outcome.

use serde::de::DeserializeOwned;
use simflow_core::{ModelRegistry, aggregate, aggregate_change};
use simflow_db::{JobRepository, WriteOutcome};
use simflow_types::{
    AggregateChangeSpec, AggregateSpec, BatchFailure, BatchOutcome, JobKind, JobRecord, JobStatus,
    RunOutcome, SimulationId, SimulationResult, SimulationSpec,
};
use uuid::Uuid;

use crate::backend::ModelBackend;
use crate::error::ComputeError;

/// What happened to one item of a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemOutcome {
    /// The result is set (now or earlier).
    Completed,
    /// An input simulation is not complete yet; try again later.
    Deferred,
    /// The item failed. Terminal failures have been recorded on the row.
    Failed {
        /// Reason.
        error: String,
        /// Whether retrying is pointless.
        terminal: bool,
    },
}

/// State of an input simulation as seen by an aggregate.
enum Source {
    Ready(SimulationResult),
    NotReady,
    Unusable(String),
}

/// Runs models and aggregations and writes results to the store.
#[derive(Debug, Clone)]
pub struct ComputeService {
    repository: JobRepository,
    registry: ModelRegistry,
    backend: ModelBackend,
}

impl ComputeService {
    /// Create a service over a store, registry, and model backend.
    pub const fn new(
        repository: JobRepository,
        registry: ModelRegistry,
        backend: ModelBackend,
    ) -> Self {
        Self {
            repository,
            registry,
            backend,
        }
    }

    /// The underlying store.
    pub const fn repository(&self) -> &JobRepository {
        &self.repository
    }

    /// The model registry.
    pub const fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// The model backend.
    pub const fn backend(&self) -> &ModelBackend {
        &self.backend
    }

    // -----------------------------------------------------------------------
    // Simulations
    // -----------------------------------------------------------------------

    /// Compute and store the result of simulation `id`.
    ///
    /// # Errors
    ///
    /// - [`ComputeError::NotFound`] if the record does not exist
    /// - [`ComputeError::ModelVersionNotFound`] if its model version is
    ///   unknown (the record is marked failed)
    /// - [`ComputeError::InvalidSpec`] if the spec cannot be run (the
    ///   record is marked failed)
    /// - [`ComputeError::Remote`] or [`ComputeError::Database`] on transient
    ///   failures (the record is left as it was)
    pub async fn run_simulation(&self, id: Uuid) -> Result<RunOutcome, ComputeError> {
        let kind = JobKind::Simulation;
        let record = self.load(kind, id).await?;

        if record.has_result() {
            tracing::info!(job_id = %id, kind = %kind, "Already complete, returning stored result");
            return Ok(complete_outcome(id, "already complete"));
        }

        let computed = match decode_spec::<SimulationSpec>(&record) {
            Ok(spec) => self.resolve_and_simulate(&spec).await,
            Err(err) => Err(err),
        };
        let computed = match computed {
            Ok(result) => result,
            Err(err) => return Err(self.record_failure(kind, id, err).await),
        };

        self.write(kind, id, &computed).await?;
        tracing::info!(
            job_id = %id,
            model_version = %computed.model_version,
            households = computed.households.len(),
            backend = self.backend.name(),
            "Simulation computed"
        );
        Ok(complete_outcome(id, "simulation computed"))
    }

    /// Run the model for `spec` without touching the store.
    ///
    /// # Errors
    ///
    /// Same model errors as [`ComputeService::run_simulation`].
    pub async fn simulate(&self, spec: &SimulationSpec) -> Result<SimulationResult, ComputeError> {
        self.resolve_and_simulate(spec).await
    }

    async fn resolve_and_simulate(
        &self,
        spec: &SimulationSpec,
    ) -> Result<SimulationResult, ComputeError> {
        let version = self
            .registry
            .resolve(spec.country, spec.model_version.as_deref())
            .map_err(|e| ComputeError::from_model(&e))?;
        self.backend.simulate(spec, &version).await
    }

    // -----------------------------------------------------------------------
    // Aggregates
    // -----------------------------------------------------------------------

    /// Compute every aggregate in `ids` whose simulation is ready.
    pub async fn process_aggregates(&self, ids: &[Uuid]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for &id in ids {
            let item = self.process_aggregate(id).await;
            record_item(&mut outcome, JobKind::Aggregate, id, item);
        }
        outcome
    }

    async fn process_aggregate(&self, id: Uuid) -> ItemOutcome {
        let result = self.try_aggregate(id).await;
        self.settle_item(JobKind::Aggregate, id, result).await
    }

    async fn try_aggregate(&self, id: Uuid) -> Result<(), ComputeError> {
        let kind = JobKind::Aggregate;
        let record = self.load(kind, id).await?;
        if record.has_result() {
            return Ok(());
        }
        let spec: AggregateSpec = decode_spec(&record)?;

        let simulation = match self.source(spec.simulation_id).await? {
            Source::Ready(simulation) => simulation,
            Source::NotReady => return Err(not_ready(spec.simulation_id)),
            Source::Unusable(reason) => return Err(ComputeError::InvalidSpec(reason)),
        };

        let output = aggregate(&simulation, spec.variable, spec.function, spec.filter.as_ref())
            .map_err(|e| ComputeError::InvalidSpec(e.to_string()))?;
        self.write(kind, id, &output).await
    }

    // -----------------------------------------------------------------------
    // Aggregate changes
    // -----------------------------------------------------------------------

    /// Compute every aggregate change in `ids` whose simulations are ready.
    pub async fn process_aggregate_changes(&self, ids: &[Uuid]) -> BatchOutcome {
        let mut outcome = BatchOutcome::default();
        for &id in ids {
            let item = self.process_aggregate_change(id).await;
            record_item(&mut outcome, JobKind::AggregateChange, id, item);
        }
        outcome
    }

    async fn process_aggregate_change(&self, id: Uuid) -> ItemOutcome {
        let result = self.try_aggregate_change(id).await;
        self.settle_item(JobKind::AggregateChange, id, result).await
    }

    async fn try_aggregate_change(&self, id: Uuid) -> Result<(), ComputeError> {
        let kind = JobKind::AggregateChange;
        let record = self.load(kind, id).await?;
        if record.has_result() {
            return Ok(());
        }
        let spec: AggregateChangeSpec = decode_spec(&record)?;

        let baseline = self.source(spec.baseline_simulation_id).await?;
        let comparison = self.source(spec.comparison_simulation_id).await?;
        let (baseline, comparison) = match (baseline, comparison) {
            (Source::Unusable(reason), _) | (_, Source::Unusable(reason)) => {
                return Err(ComputeError::InvalidSpec(reason));
            }
            (Source::NotReady, _) => return Err(not_ready(spec.baseline_simulation_id)),
            (_, Source::NotReady) => return Err(not_ready(spec.comparison_simulation_id)),
            (Source::Ready(b), Source::Ready(c)) => (b, c),
        };

        let side = |simulation: &SimulationResult, sim_id: SimulationId| {
            let side = spec.side(sim_id);
            aggregate(simulation, side.variable, side.function, side.filter.as_ref())
                .map_err(|e| ComputeError::InvalidSpec(e.to_string()))
        };
        let baseline_value = side(&baseline, spec.baseline_simulation_id)?;
        let comparison_value = side(&comparison, spec.comparison_simulation_id)?;
        let output = aggregate_change(&baseline_value, &comparison_value)
            .map_err(|e| ComputeError::InvalidSpec(e.to_string()))?;

        self.write(kind, id, &output).await
    }

    // -----------------------------------------------------------------------
    // Shared helpers
    // -----------------------------------------------------------------------

    async fn load(&self, kind: JobKind, id: Uuid) -> Result<JobRecord, ComputeError> {
        self.repository
            .get(kind, id)
            .await?
            .ok_or(ComputeError::NotFound { kind, id })
    }

    async fn source(&self, id: SimulationId) -> Result<Source, ComputeError> {
        let Some(record) = self.repository.get(JobKind::Simulation, id.into_inner()).await? else {
            return Ok(Source::Unusable(format!("simulation {id} not found")));
        };
        match (record.result, record.status) {
            (Some(value), _) => Ok(serde_json::from_value(value).map_or_else(
                |e| Source::Unusable(format!("simulation {id} result is invalid: {e}")),
                Source::Ready,
            )),
            (None, JobStatus::Failed) => Ok(Source::Unusable(format!(
                "simulation {id} failed: {}",
                record.error.unwrap_or_default()
            ))),
            (None, _) => Ok(Source::NotReady),
        }
    }

    async fn write<T: serde::Serialize>(
        &self,
        kind: JobKind,
        id: Uuid,
        result: &T,
    ) -> Result<(), ComputeError> {
        let value = serde_json::to_value(result)
            .map_err(|e| ComputeError::InvalidSpec(format!("result is not serializable: {e}")))?;
        match self.repository.complete(kind, id, value).await? {
            WriteOutcome::Written | WriteOutcome::AlreadyComplete => Ok(()),
            WriteOutcome::NotFound => Err(ComputeError::NotFound { kind, id }),
        }
    }

    /// Persist a terminal failure on the row; transient errors pass through
    /// untouched so dispatch can try again.
    async fn record_failure(&self, kind: JobKind, id: Uuid, err: ComputeError) -> ComputeError {
        if err.is_terminal() && !matches!(err, ComputeError::NotFound { .. }) {
            if let Err(db) = self.repository.fail(kind, id, &err.to_string()).await {
                tracing::error!(job_id = %id, kind = %kind, error = %db, "Failed to record failure");
            }
        }
        err
    }

    async fn settle_item(
        &self,
        kind: JobKind,
        id: Uuid,
        result: Result<(), ComputeError>,
    ) -> ItemOutcome {
        match result {
            Ok(()) => ItemOutcome::Completed,
            Err(ComputeError::SourceNotReady(reason)) => {
                tracing::debug!(job_id = %id, kind = %kind, reason = %reason, "Deferred");
                ItemOutcome::Deferred
            }
            Err(err) => {
                let terminal = err.is_terminal();
                let err = if terminal {
                    self.record_failure(kind, id, err).await
                } else {
                    err
                };
                tracing::warn!(job_id = %id, kind = %kind, terminal, error = %err, "Item failed");
                ItemOutcome::Failed {
                    error: err.to_string(),
                    terminal,
                }
            }
        }
    }
}

fn decode_spec<T: DeserializeOwned>(record: &JobRecord) -> Result<T, ComputeError> {
    serde_json::from_value(record.spec.clone())
        .map_err(|e| ComputeError::InvalidSpec(format!("stored spec is invalid: {e}")))
}

fn complete_outcome(id: Uuid, message: &str) -> RunOutcome {
    RunOutcome {
        id,
        status: JobStatus::Complete,
        message: message.to_owned(),
    }
}

fn not_ready(id: SimulationId) -> ComputeError {
    ComputeError::SourceNotReady(format!("simulation {id} is not complete"))
}

fn record_item(outcome: &mut BatchOutcome, kind: JobKind, id: Uuid, item: ItemOutcome) {
    match item {
        ItemOutcome::Completed => outcome.completed.push(id),
        ItemOutcome::Deferred => outcome.deferred.push(id),
        ItemOutcome::Failed { error, terminal } => {
            tracing::debug!(job_id = %id, kind = %kind, terminal, "Recorded batch failure");
            outcome.failed.push(BatchFailure {
                id,
                error,
                terminal,
            });
        }
    }
}
