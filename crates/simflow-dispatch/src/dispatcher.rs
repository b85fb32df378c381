//! The dispatch pass and the loop that repeats it.
//!
//! A pass walks the kinds in dependency order (simulations, then
//! aggregates, then aggregate changes) so an aggregate whose simulation
//! finished earlier in the same pass can run at once. For each kind it:
//!
//! 1. Returns claims older than the lease to `pending` (a dispatcher died).
//! 2. Claims up to `batch_size` pending records (`pending -> in_progress`).
//! 3. Calls compute: one request per simulation, run `concurrency` at a
//!    time, and one batch request for the other kinds.
//! 4. Settles every claimed record (see [`Dispatcher::run_pass`]).
//!
//! Claims are exclusive, so two dispatchers running at once never send the
//! same record. If a claim outlives its lease and is sent twice anyway, the
//! write-once store keeps the first result.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use simflow_compute::{ComputeService, ModelBackend};
use simflow_core::config::DispatchConfig;
use simflow_core::{ModelRegistry, RetryPolicy, Retryable, SimflowConfig, retry};
use simflow_db::JobRepository;
use simflow_types::{BatchOutcome, JobKind, JobRecord};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::target::{ComputeTarget, HttpComputeClient};

/// Shortest loop interval, whatever the config says.
const MIN_INTERVAL: Duration = Duration::from_millis(100);

/// Counts from one pass, summed over all kinds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    /// Stale claims returned to `pending` before claiming.
    pub reclaimed: u64,
    /// Records claimed this pass.
    pub claimed: u64,
    /// Claimed records that now have a result.
    pub completed: u64,
    /// Claimed records returned to `pending` for a later pass.
    pub released: u64,
    /// Claimed records marked failed.
    pub failed: u64,
}

impl PassReport {
    /// Whether the pass found anything to do.
    pub const fn is_idle(&self) -> bool {
        self.reclaimed == 0 && self.claimed == 0
    }
}

/// How one claimed record ends the pass.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Settle {
    Completed,
    /// An input is not ready; the claim's attempt is refunded.
    Deferred,
    Transient(String),
    Terminal(String),
}

impl Settle {
    fn from_error(error: &DispatchError) -> Self {
        if error.is_transient() {
            Self::Transient(error.to_string())
        } else {
            Self::Terminal(error.to_string())
        }
    }
}

/// Claims pending records and drives compute until each has a result or
/// has failed.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    repository: JobRepository,
    target: ComputeTarget,
    config: DispatchConfig,
    retry: RetryPolicy,
}

impl Dispatcher {
    /// Create a dispatcher. The request retry policy comes from
    /// `config.retry`.
    pub fn new(repository: JobRepository, target: ComputeTarget, config: DispatchConfig) -> Self {
        let retry = RetryPolicy::from(&config.retry);
        Self {
            repository,
            target,
            config,
            retry,
        }
    }

    /// Build the dispatcher the config describes: HTTP to
    /// `dispatch.compute_url`, or an in-process compute service when
    /// `dispatch.in_process` is set.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Config`] if the HTTP client or model
    /// backend cannot be built.
    pub fn from_config(
        config: &SimflowConfig,
        repository: JobRepository,
    ) -> Result<Self, DispatchError> {
        let target = if config.dispatch.in_process {
            let backend = ModelBackend::from_config(&config.compute)
                .map_err(|e| DispatchError::Config(e.to_string()))?;
            ComputeTarget::InProcess(ComputeService::new(
                repository.clone(),
                ModelRegistry::from_config(&config.models),
                backend,
            ))
        } else {
            ComputeTarget::Http(HttpComputeClient::new(
                &config.dispatch.compute_url,
                config.dispatch.request_timeout(),
            )?)
        };
        Ok(Self::new(repository, target, config.dispatch.clone()))
    }

    /// Replace the request retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// The compute target.
    pub const fn target(&self) -> &ComputeTarget {
        &self.target
    }

    /// Run passes every `interval` until `shutdown` resolves.
    ///
    /// Passes never overlap: a pass that outlasts the interval delays the
    /// next tick. A pass in flight when `shutdown` resolves is finished
    /// first. A failed pass is logged and the loop carries on.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let mut ticker = tokio::time::interval(self.config.interval().max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            interval_secs = self.config.interval_secs,
            batch_size = self.config.batch_size,
            target = self.target.name(),
            "Dispatch loop starting"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.run_pass().await {
                        error!(error = %e, "Dispatch pass failed");
                    }
                }
            }
        }

        info!("Dispatch loop stopped");
    }

    /// Run one pass over every kind.
    ///
    /// Each claimed record is settled as follows:
    ///
    /// - compute set the result: nothing to do
    /// - an input simulation is not complete: back to `pending`, with the
    ///   claim's attempt given back
    /// - terminal error (unknown model version, rejected spec): marked
    ///   failed with the error text
    /// - transient error after the request retries are spent: back to
    ///   `pending` while the record has been claimed fewer than
    ///   `max_job_attempts` times, otherwise marked failed
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Database`] if the store fails. Records
    /// claimed before the failure are recovered by the lease.
    pub async fn run_pass(&self) -> Result<PassReport, DispatchError> {
        let mut report = PassReport::default();
        for kind in JobKind::ALL {
            self.pass_kind(kind, &mut report).await?;
        }
        if report.is_idle() {
            debug!("Dispatch pass found nothing to do");
        } else {
            info!(
                reclaimed = report.reclaimed,
                claimed = report.claimed,
                completed = report.completed,
                released = report.released,
                failed = report.failed,
                "Dispatch pass finished"
            );
        }
        Ok(report)
    }

    async fn pass_kind(&self, kind: JobKind, report: &mut PassReport) -> Result<(), DispatchError> {
        let lease =
            chrono::Duration::from_std(self.config.lease()).unwrap_or(chrono::Duration::MAX);
        if let Some(cutoff) = Utc::now().checked_sub_signed(lease) {
            let reclaimed = self.repository.release_stale(kind, cutoff).await?;
            report.reclaimed = report.reclaimed.saturating_add(reclaimed);
        }

        let claimed = self
            .repository
            .claim_pending(kind, self.config.batch_size)
            .await?;
        if claimed.is_empty() {
            return Ok(());
        }
        report.claimed = report
            .claimed
            .saturating_add(u64::try_from(claimed.len()).unwrap_or(u64::MAX));

        let settled = match kind {
            JobKind::Simulation => self.dispatch_simulations(claimed).await,
            JobKind::Aggregate | JobKind::AggregateChange => {
                self.dispatch_batch(kind, claimed).await
            }
        };

        for (record, settle) in settled {
            self.settle(kind, &record, settle, report).await?;
        }
        Ok(())
    }

    async fn dispatch_simulations(&self, claimed: Vec<JobRecord>) -> Vec<(JobRecord, Settle)> {
        futures::stream::iter(claimed)
            .map(|record| async move {
                let settle = self.dispatch_simulation(&record).await;
                (record, settle)
            })
            .buffer_unordered(self.config.concurrency.max(1))
            .collect()
            .await
    }

    async fn dispatch_simulation(&self, record: &JobRecord) -> Settle {
        let id = record.id;
        let attempts = record.attempts;
        let outcome = retry(&self.retry, "run_simulation", move |attempt| {
            debug!(
                job_id = %id,
                kind = "simulation",
                claim = attempts,
                attempt,
                "Sending to compute"
            );
            self.target.run_simulation(id)
        })
        .await;

        match outcome {
            Ok(run) => {
                debug!(job_id = %id, kind = "simulation", message = %run.message, "Compute finished");
                Settle::Completed
            }
            Err(e) => Settle::from_error(&e),
        }
    }

    async fn dispatch_batch(
        &self,
        kind: JobKind,
        claimed: Vec<JobRecord>,
    ) -> Vec<(JobRecord, Settle)> {
        let ids: Vec<Uuid> = claimed.iter().map(|r| r.id).collect();
        let ids_ref = ids.as_slice();
        let outcome = retry(&self.retry, kind.as_str(), move |attempt| {
            debug!(kind = %kind, items = ids_ref.len(), attempt, "Sending batch to compute");
            self.target.process_batch(kind, ids_ref)
        })
        .await;

        match outcome {
            Ok(outcome) => {
                let mut by_id = settles_by_id(outcome);
                claimed
                    .into_iter()
                    .map(|record| {
                        let settle = by_id.remove(&record.id).unwrap_or_else(|| {
                            Settle::Transient("compute returned no outcome".to_owned())
                        });
                        (record, settle)
                    })
                    .collect()
            }
            Err(e) => {
                let settle = Settle::from_error(&e);
                claimed.into_iter().map(|record| (record, settle.clone())).collect()
            }
        }
    }

    async fn settle(
        &self,
        kind: JobKind,
        record: &JobRecord,
        settle: Settle,
        report: &mut PassReport,
    ) -> Result<(), DispatchError> {
        let id = record.id;
        match settle {
            Settle::Completed => {
                report.completed = report.completed.saturating_add(1);
            }
            Settle::Deferred => {
                self.repository.defer(kind, id).await?;
                report.released = report.released.saturating_add(1);
                debug!(job_id = %id, kind = %kind, "Input not ready, released");
            }
            Settle::Terminal(message) => {
                self.repository.fail(kind, id, &message).await?;
                report.failed = report.failed.saturating_add(1);
            }
            Settle::Transient(message) => {
                let attempts = u32::try_from(record.attempts).unwrap_or(0);
                if attempts >= self.config.max_job_attempts {
                    let message = format!("gave up after {attempts} attempts: {message}");
                    self.repository.fail(kind, id, &message).await?;
                    report.failed = report.failed.saturating_add(1);
                } else {
                    self.repository.release(kind, id).await?;
                    report.released = report.released.saturating_add(1);
                    warn!(
                        job_id = %id,
                        kind = %kind,
                        attempt = attempts,
                        max_attempts = self.config.max_job_attempts,
                        error = %message,
                        "Transient failure, released for a later pass"
                    );
                }
            }
        }
        Ok(())
    }
}

fn settles_by_id(outcome: BatchOutcome) -> BTreeMap<Uuid, Settle> {
    let completed = outcome.completed.into_iter().map(|id| (id, Settle::Completed));
    let deferred = outcome.deferred.into_iter().map(|id| (id, Settle::Deferred));
    let failed = outcome.failed.into_iter().map(|f| {
        let settle = if f.terminal {
            Settle::Terminal(f.error)
        } else {
            Settle::Transient(f.error)
        };
        (f.id, settle)
    });
    completed.chain(deferred).chain(failed).collect()
}

#[cfg(test)]
mod tests {
    use simflow_types::BatchFailure;

    use super::*;

    #[test]
    fn batch_outcome_maps_to_settles() {
        let (a, b, c, d) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
        let by_id = settles_by_id(BatchOutcome {
            completed: vec![a],
            deferred: vec![b],
            failed: vec![
                BatchFailure {
                    id: c,
                    error: "gone".to_owned(),
                    terminal: true,
                },
                BatchFailure {
                    id: d,
                    error: "db down".to_owned(),
                    terminal: false,
                },
            ],
        });
        assert_eq!(by_id.get(&a), Some(&Settle::Completed));
        assert_eq!(by_id.get(&b), Some(&Settle::Deferred));
        assert_eq!(by_id.get(&c), Some(&Settle::Terminal("gone".to_owned())));
        assert_eq!(by_id.get(&d), Some(&Settle::Transient("db down".to_owned())));
    }

    #[test]
    fn empty_report_is_idle() {
        assert!(PassReport::default().is_idle());
        let busy = PassReport {
            claimed: 1,
            ..PassReport::default()
        };
        assert!(!busy.is_idle());
    }
}
