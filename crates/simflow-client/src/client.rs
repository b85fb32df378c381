//! HTTP client for the creation API.
//!
//! Submitting returns at once with a pending record; the `wait_for_*`
//! methods poll the record until its result is set, it fails, or the wait
//! budget runs out. Every request is retried while the server answers 503.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use simflow_core::{RetryPolicy, retry};
use simflow_types::{
    Aggregate, AggregateChange, AggregateChangeOutput, AggregateChangeSpec, AggregateOutput,
    AggregateSpec, CountryVersions, ErrorBody, JobCreated, JobKind, JobStatus, JobStatusView,
    Simulation, SimulationResult, SimulationSpec,
};
use tokio::time::Instant;
use uuid::Uuid;

use crate::error::ClientError;

/// Tries per request while the server answers 503.
pub const UNAVAILABLE_ATTEMPTS: u32 = 5;

/// Pause between those tries.
pub const UNAVAILABLE_DELAY: Duration = Duration::from_secs(2);

/// A record view the client can poll.
pub trait Polled: DeserializeOwned {
    /// Result type once complete.
    type Output;
    /// Kind served at this record's routes.
    const KIND: JobKind;

    /// Split into status, failure reason, and result.
    fn into_parts(self) -> (JobStatus, Option<String>, Option<Self::Output>);
}

macro_rules! impl_polled {
    ($view:ty, $output:ty, $kind:expr) => {
        impl Polled for $view {
            type Output = $output;
            const KIND: JobKind = $kind;

            fn into_parts(self) -> (JobStatus, Option<String>, Option<$output>) {
                (self.status, self.error, self.result)
            }
        }
    };
}

impl_polled!(Simulation, SimulationResult, JobKind::Simulation);
impl_polled!(Aggregate, AggregateOutput, JobKind::Aggregate);
impl_polled!(AggregateChange, AggregateChangeOutput, JobKind::AggregateChange);

/// Client for one creation API deployment.
#[derive(Debug, Clone)]
pub struct SimflowClient {
    http: reqwest::Client,
    base_url: String,
    retry: RetryPolicy,
}

impl SimflowClient {
    /// Create a client for the API at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ClientError::Config`] if the HTTP client cannot be built.
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .build()
            .map_err(|e| ClientError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_owned(),
            retry: RetryPolicy::fixed(UNAVAILABLE_ATTEMPTS, UNAVAILABLE_DELAY),
        })
    }

    /// Replace the 503 retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    // -----------------------------------------------------------------------
    // Submission
    // -----------------------------------------------------------------------

    /// Submit a simulation.
    pub async fn create_simulation(
        &self,
        spec: &SimulationSpec,
    ) -> Result<JobCreated, ClientError> {
        self.post(JobKind::Simulation.path(), spec).await
    }

    /// Submit an aggregate.
    pub async fn create_aggregate(&self, spec: &AggregateSpec) -> Result<JobCreated, ClientError> {
        self.post(JobKind::Aggregate.path(), spec).await
    }

    /// Submit an aggregate change.
    pub async fn create_aggregate_change(
        &self,
        spec: &AggregateChangeSpec,
    ) -> Result<JobCreated, ClientError> {
        self.post(JobKind::AggregateChange.path(), spec).await
    }

    /// Submit several aggregates in one request. The server stores all of
    /// them or none.
    pub async fn create_aggregates(
        &self,
        specs: &[AggregateSpec],
    ) -> Result<Vec<JobCreated>, ClientError> {
        let path = format!("{}/bulk", JobKind::Aggregate.path());
        self.post(&path, &specs).await
    }

    /// Submit several aggregate changes in one request.
    pub async fn create_aggregate_changes(
        &self,
        specs: &[AggregateChangeSpec],
    ) -> Result<Vec<JobCreated>, ClientError> {
        let path = format!("{}/bulk", JobKind::AggregateChange.path());
        self.post(&path, &specs).await
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    /// Fetch a simulation.
    pub async fn get_simulation(&self, id: Uuid) -> Result<Simulation, ClientError> {
        self.get_record(id).await
    }

    /// Fetch an aggregate.
    pub async fn get_aggregate(&self, id: Uuid) -> Result<Aggregate, ClientError> {
        self.get_record(id).await
    }

    /// Fetch an aggregate change.
    pub async fn get_aggregate_change(&self, id: Uuid) -> Result<AggregateChange, ClientError> {
        self.get_record(id).await
    }

    /// Fetch the status of any record.
    pub async fn status(&self, kind: JobKind, id: Uuid) -> Result<JobStatusView, ClientError> {
        self.get(&format!("{}/{id}/status", kind.path())).await
    }

    /// Model versions for every country.
    pub async fn versions(&self) -> Result<BTreeMap<String, CountryVersions>, ClientError> {
        self.get("versions").await
    }

    // -----------------------------------------------------------------------
    // Polling
    // -----------------------------------------------------------------------

    /// Poll a simulation every `interval` until it has a result.
    ///
    /// # Errors
    ///
    /// [`ClientError::Failed`] if the record fails, [`ClientError::Timeout`]
    /// if `timeout` passes first, or any request error.
    pub async fn wait_for_simulation(
        &self,
        id: Uuid,
        interval: Duration,
        timeout: Duration,
    ) -> Result<SimulationResult, ClientError> {
        self.wait_for::<Simulation>(id, interval, timeout).await
    }

    /// Poll an aggregate until it has a result.
    pub async fn wait_for_aggregate(
        &self,
        id: Uuid,
        interval: Duration,
        timeout: Duration,
    ) -> Result<AggregateOutput, ClientError> {
        self.wait_for::<Aggregate>(id, interval, timeout).await
    }

    /// Poll an aggregate change until it has a result.
    pub async fn wait_for_aggregate_change(
        &self,
        id: Uuid,
        interval: Duration,
        timeout: Duration,
    ) -> Result<AggregateChangeOutput, ClientError> {
        self.wait_for::<AggregateChange>(id, interval, timeout).await
    }

    /// Poll any record view until it has a result.
    pub async fn wait_for<R: Polled>(
        &self,
        id: Uuid,
        interval: Duration,
        timeout: Duration,
    ) -> Result<R::Output, ClientError> {
        let started = Instant::now();
        let mut polls: u32 = 0;
        loop {
            polls = polls.saturating_add(1);
            let (status, error, result) = self.get_record::<R>(id).await?.into_parts();
            if let Some(result) = result {
                tracing::debug!(job_id = %id, kind = %R::KIND, polls, "Result available");
                return Ok(result);
            }
            if status == JobStatus::Failed {
                return Err(ClientError::Failed {
                    kind: R::KIND,
                    id,
                    error: error.unwrap_or_else(|| "no reason recorded".to_owned()),
                });
            }
            let waited = started.elapsed();
            if waited >= timeout {
                return Err(ClientError::Timeout {
                    kind: R::KIND,
                    id,
                    waited,
                });
            }
            tracing::debug!(
                job_id = %id,
                kind = %R::KIND,
                status = %status,
                polls,
                "Waiting for result"
            );
            tokio::time::sleep(interval.min(timeout.saturating_sub(waited))).await;
        }
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    async fn get_record<R: Polled>(&self, id: Uuid) -> Result<R, ClientError> {
        self.get(&format!("{}/{id}", R::KIND.path())).await
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        retry(&self.retry, path, |_| {
            let request = self.http.get(&url);
            async move { decode(request.send().await?).await }
        })
        .await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let url = self.url(path);
        retry(&self.retry, path, |_| {
            let request = self.http.post(&url).json(body);
            async move { decode(request.send().await?).await }
        })
        .await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response.json::<T>().await?);
    }
    let text = response.text().await.unwrap_or_default();
    let (message, code) = match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => (body.error, body.code),
        Err(_) => (text, None),
    };
    Err(ClientError::Status {
        status: status.as_u16(),
        message,
        code,
    })
}
