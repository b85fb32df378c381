//! Where dispatch sends work.
//!
//! Uses enum dispatch instead of trait objects because async methods are
//! not dyn-compatible in Rust.

use std::time::Duration;

use simflow_compute::ComputeService;
use simflow_types::{BatchOutcome, BatchRequest, JobKind, RunOutcome};
use uuid::Uuid;

use crate::error::DispatchError;

/// The compute side of dispatch.
#[derive(Debug, Clone)]
pub enum ComputeTarget {
    /// The compute API over HTTP.
    Http(HttpComputeClient),
    /// A compute service in the same process, sharing the store.
    InProcess(ComputeService),
}

impl ComputeTarget {
    /// Compute one simulation.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] classified as transient or terminal.
    pub async fn run_simulation(&self, id: Uuid) -> Result<RunOutcome, DispatchError> {
        match self {
            Self::Http(client) => client.run_simulation(id).await,
            Self::InProcess(service) => Ok(service.run_simulation(id).await?),
        }
    }

    /// Compute a batch of aggregates or aggregate changes.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError`] if the whole call fails. Per-item failures
    /// are in the returned outcome.
    pub async fn process_batch(
        &self,
        kind: JobKind,
        ids: &[Uuid],
    ) -> Result<BatchOutcome, DispatchError> {
        match (self, kind) {
            (Self::Http(client), _) => client.process_batch(kind, ids).await,
            (Self::InProcess(service), JobKind::Aggregate) => {
                Ok(service.process_aggregates(ids).await)
            }
            (Self::InProcess(service), JobKind::AggregateChange) => {
                Ok(service.process_aggregate_changes(ids).await)
            }
            (Self::InProcess(_), JobKind::Simulation) => Err(not_batched()),
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Http(_) => "http",
            Self::InProcess(_) => "in_process",
        }
    }
}

/// HTTP client for the compute API.
#[derive(Debug, Clone)]
pub struct HttpComputeClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpComputeClient {
    /// Create a client for the compute API at `base_url`. `timeout` bounds
    /// each request; a simulation can legitimately take many minutes.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DispatchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DispatchError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    /// Base URL requests go to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn run_simulation(&self, id: Uuid) -> Result<RunOutcome, DispatchError> {
        let url = format!("{}/run_simulation_sync/{id}", self.base_url);
        let response = self.client.post(&url).send().await?;
        decode(response).await
    }

    async fn process_batch(
        &self,
        kind: JobKind,
        ids: &[Uuid],
    ) -> Result<BatchOutcome, DispatchError> {
        let path = match kind {
            JobKind::Aggregate => "process_aggregates",
            JobKind::AggregateChange => "process_aggregate_changes",
            JobKind::Simulation => return Err(not_batched()),
        };
        let url = format!("{}/{path}", self.base_url);
        let body = BatchRequest { ids: ids.to_vec() };
        let response = self.client.post(&url).json(&body).send().await?;
        decode(response).await
    }
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, DispatchError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "unable to read error body".to_owned());
        return Err(DispatchError::from_response(status, &body));
    }
    Ok(response.json::<T>().await?)
}

fn not_batched() -> DispatchError {
    DispatchError::Config("simulations are dispatched one at a time".to_owned())
}
