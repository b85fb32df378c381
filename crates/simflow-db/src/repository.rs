//! The store interface used by every service.
//!
//! [`JobRepository`] is an enum over the concrete stores rather than a
//! trait object: the set of backends is closed and the async methods stay
//! plain `async fn`.
//!
//! # Record lifecycle
//!
//! ```text
//! insert ─► pending ─claim_pending─► in_progress ─complete─► complete
//!              ▲                          │
//!              └──release / release_stale─┤
//!                                         └──fail──► failed
//! ```
//!
//! [`JobRepository::complete`] is the only way a result is written, and it
//! only succeeds while `result IS NULL`. A second write, whether from a
//! duplicate dispatch or a retried request, is reported as
//! [`WriteOutcome::AlreadyComplete`] and leaves the first value in place.

use chrono::{DateTime, Utc};
use simflow_core::config::{DatabaseConfig, StoreBackend};
use simflow_types::{JobKind, JobRecord, JobStatus};
use uuid::Uuid;

use crate::error::DbError;
use crate::memory::MemoryJobRepository;
use crate::postgres::{PgJobRepository, PostgresConfig};

/// Result of a write-once result update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The result was null and is now set.
    Written,
    /// A result was already present; nothing changed.
    AlreadyComplete,
    /// No record with that id.
    NotFound,
}

/// Which records a list call returns.
///
/// Records are ordered newest first; `skip` and `limit` page through that
/// order. `spec_ids` matches top-level id fields of the stored spec, such
/// as an aggregate's `simulation_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListFilter {
    /// Only records in this status.
    pub status: Option<JobStatus>,
    /// Spec fields that must hold the given id.
    pub spec_ids: Vec<(&'static str, Uuid)>,
    /// Records to skip.
    pub skip: u32,
    /// Maximum records returned.
    pub limit: u32,
}

impl ListFilter {
    /// The first `limit` records, any status.
    pub const fn first(limit: u32) -> Self {
        Self {
            status: None,
            spec_ids: Vec::new(),
            skip: 0,
            limit,
        }
    }

    /// Only records in `status`.
    #[must_use]
    pub const fn with_status(mut self, status: JobStatus) -> Self {
        self.status = Some(status);
        self
    }

    /// Only records whose spec field `field` is `id`.
    #[must_use]
    pub fn with_spec_id(mut self, field: &'static str, id: Uuid) -> Self {
        self.spec_ids.push((field, id));
        self
    }

    /// Skip the first `skip` records.
    #[must_use]
    pub const fn skipping(mut self, skip: u32) -> Self {
        self.skip = skip;
        self
    }

    /// Whether `record` passes the status and spec conditions.
    pub fn matches(&self, record: &JobRecord) -> bool {
        self.status.is_none_or(|s| record.status == s)
            && self.spec_ids.iter().all(|(field, id)| {
                record
                    .spec
                    .get(*field)
                    .and_then(serde_json::Value::as_str)
                    .and_then(|value| value.parse::<Uuid>().ok())
                    == Some(*id)
            })
    }
}

/// Persistent store for simulations, aggregates, and aggregate changes.
#[derive(Debug, Clone)]
pub enum JobRepository {
    /// `PostgreSQL`.
    Postgres(PgJobRepository),
    /// Process memory.
    Memory(MemoryJobRepository),
}

impl JobRepository {
    /// A fresh in-memory repository.
    pub fn memory() -> Self {
        Self::Memory(MemoryJobRepository::new())
    }

    /// Open the store selected by `config`, applying migrations if enabled.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database is unreachable or a migration
    /// fails.
    pub async fn from_config(config: &DatabaseConfig) -> Result<Self, DbError> {
        match config.backend {
            StoreBackend::Memory => {
                tracing::warn!("Using in-memory store; records are lost on exit");
                Ok(Self::memory())
            }
            StoreBackend::Postgres => {
                let repo = PgJobRepository::connect(&PostgresConfig::from(config)).await?;
                if config.run_migrations {
                    repo.run_migrations().await?;
                }
                Ok(Self::Postgres(repo))
            }
        }
    }

    /// Store a new pending record with a null result.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails.
    pub async fn insert(&self, kind: JobKind, spec: serde_json::Value) -> Result<JobRecord, DbError> {
        let record = JobRecord::pending(kind, spec);
        match self {
            Self::Postgres(pg) => pg.insert(&record).await?,
            Self::Memory(mem) => mem.insert(record.clone()).await,
        }
        tracing::debug!(job_id = %record.id, kind = %kind, "Inserted pending record");
        Ok(record)
    }

    /// Store several pending records at once. Either all are stored or
    /// none are.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the insert fails.
    pub async fn insert_many(
        &self,
        kind: JobKind,
        specs: Vec<serde_json::Value>,
    ) -> Result<Vec<JobRecord>, DbError> {
        let records: Vec<JobRecord> = specs
            .into_iter()
            .map(|spec| JobRecord::pending(kind, spec))
            .collect();
        match self {
            Self::Postgres(pg) => pg.insert_many(&records).await?,
            Self::Memory(mem) => mem.insert_many(records.clone()).await,
        }
        tracing::debug!(kind = %kind, count = records.len(), "Inserted pending records");
        Ok(records)
    }

    /// Fetch one record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn get(&self, kind: JobKind, id: Uuid) -> Result<Option<JobRecord>, DbError> {
        match self {
            Self::Postgres(pg) => pg.get(kind, id).await,
            Self::Memory(mem) => Ok(mem.get(kind, id).await),
        }
    }

    /// Newest records first, narrowed and paged by `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the query fails.
    pub async fn list(&self, kind: JobKind, filter: &ListFilter) -> Result<Vec<JobRecord>, DbError> {
        match self {
            Self::Postgres(pg) => pg.list(kind, filter).await,
            Self::Memory(mem) => Ok(mem.list(kind, filter).await),
        }
    }

    /// Atomically move up to `limit` of the oldest pending records to
    /// `in_progress` and return them. Concurrent callers never receive the
    /// same record.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the update fails.
    pub async fn claim_pending(&self, kind: JobKind, limit: u32) -> Result<Vec<JobRecord>, DbError> {
        let claimed = match self {
            Self::Postgres(pg) => pg.claim_pending(kind, limit).await?,
            Self::Memory(mem) => mem.claim_pending(kind, limit).await,
        };
        if !claimed.is_empty() {
            tracing::debug!(kind = %kind, count = claimed.len(), "Claimed pending records");
        }
        Ok(claimed)
    }

    /// Write the result if none is set yet.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the update fails.
    pub async fn complete(
        &self,
        kind: JobKind,
        id: Uuid,
        result: serde_json::Value,
    ) -> Result<WriteOutcome, DbError> {
        let outcome = match self {
            Self::Postgres(pg) => pg.complete(kind, id, &result).await?,
            Self::Memory(mem) => mem.complete(kind, id, result).await,
        };
        match outcome {
            WriteOutcome::Written => {
                tracing::info!(job_id = %id, kind = %kind, "Result written");
            }
            WriteOutcome::AlreadyComplete => {
                tracing::info!(job_id = %id, kind = %kind, "Result already present, kept");
            }
            WriteOutcome::NotFound => {}
        }
        Ok(outcome)
    }

    /// Mark a record permanently failed. Returns `false` if it does not
    /// exist or already has a result.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the update fails.
    pub async fn fail(&self, kind: JobKind, id: Uuid, error: &str) -> Result<bool, DbError> {
        let failed = match self {
            Self::Postgres(pg) => pg.fail(kind, id, error).await?,
            Self::Memory(mem) => mem.fail(kind, id, error).await,
        };
        if failed {
            tracing::warn!(job_id = %id, kind = %kind, error, "Record marked failed");
        }
        Ok(failed)
    }

    /// Return an `in_progress` record to `pending` for a later pass.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the update fails.
    pub async fn release(&self, kind: JobKind, id: Uuid) -> Result<bool, DbError> {
        match self {
            Self::Postgres(pg) => pg.release(kind, id).await,
            Self::Memory(mem) => Ok(mem.release(kind, id).await),
        }
    }

    /// Return an `in_progress` record to `pending` because an input is not
    /// ready yet. Unlike [`JobRepository::release`] this gives back the
    /// attempt the claim counted, so waiting never uses up the retry budget.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the update fails.
    pub async fn defer(&self, kind: JobKind, id: Uuid) -> Result<bool, DbError> {
        match self {
            Self::Postgres(pg) => pg.defer(kind, id).await,
            Self::Memory(mem) => Ok(mem.defer(kind, id).await),
        }
    }

    /// Return every `in_progress` record claimed before `older_than` to
    /// `pending`. Recovers claims left by a dispatcher that died mid-pass.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the update fails.
    pub async fn release_stale(
        &self,
        kind: JobKind,
        older_than: DateTime<Utc>,
    ) -> Result<u64, DbError> {
        let released = match self {
            Self::Postgres(pg) => pg.release_stale(kind, older_than).await?,
            Self::Memory(mem) => mem.release_stale(kind, older_than).await,
        };
        if released > 0 {
            tracing::warn!(kind = %kind, released, "Released stale claims");
        }
        Ok(released)
    }

    /// Connectivity check for health probes.
    ///
    /// # Errors
    ///
    /// Returns [`DbError`] if the database does not answer.
    pub async fn ping(&self) -> Result<(), DbError> {
        match self {
            Self::Postgres(pg) => pg.ping().await,
            Self::Memory(_) => Ok(()),
        }
    }

    /// Close pooled connections. A no-op for the memory store.
    pub async fn close(&self) {
        if let Self::Postgres(pg) = self {
            pg.close().await;
        }
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use chrono::Duration;
    use serde_json::json;

    use super::*;

    async fn repo_with(kind: JobKind, n: usize) -> (JobRepository, Vec<Uuid>) {
        let repo = JobRepository::memory();
        let mut ids = Vec::new();
        for i in 0..n {
            let record = repo.insert(kind, json!({ "n": i })).await;
            if let Ok(record) = record {
                ids.push(record.id);
            }
        }
        (repo, ids)
    }

    #[tokio::test]
    async fn inserted_record_is_pending_with_null_result() {
        let (repo, ids) = repo_with(JobKind::Simulation, 1).await;
        let record = repo.get(JobKind::Simulation, ids[0]).await.ok().flatten();
        let Some(record) = record else {
            panic!("record should exist");
        };
        assert_eq!(record.status, JobStatus::Pending);
        assert!(record.result.is_none());
    }

    #[tokio::test]
    async fn kinds_are_separate_tables() {
        let (repo, ids) = repo_with(JobKind::Simulation, 1).await;
        let other = repo.get(JobKind::Aggregate, ids[0]).await.ok().flatten();
        assert!(other.is_none());
    }

    #[tokio::test]
    async fn claim_takes_oldest_and_never_twice() {
        let (repo, ids) = repo_with(JobKind::Aggregate, 3).await;

        let first = repo.claim_pending(JobKind::Aggregate, 2).await.unwrap_or_default();
        assert_eq!(first.iter().map(|r| r.id).collect::<Vec<_>>(), ids[..2].to_vec());
        assert!(first.iter().all(|r| r.status == JobStatus::InProgress && r.attempts == 1));

        let second = repo.claim_pending(JobKind::Aggregate, 10).await.unwrap_or_default();
        assert_eq!(second.iter().map(|r| r.id).collect::<Vec<_>>(), vec![ids[2]]);

        let third = repo.claim_pending(JobKind::Aggregate, 10).await.unwrap_or_default();
        assert!(third.is_empty());
    }

    #[tokio::test]
    async fn result_is_written_once() {
        let (repo, ids) = repo_with(JobKind::Simulation, 1).await;
        let id = ids[0];

        let first = repo.complete(JobKind::Simulation, id, json!({ "v": 1 })).await;
        let second = repo.complete(JobKind::Simulation, id, json!({ "v": 2 })).await;
        assert_eq!(first.ok(), Some(WriteOutcome::Written));
        assert_eq!(second.ok(), Some(WriteOutcome::AlreadyComplete));

        let record = repo.get(JobKind::Simulation, id).await.ok().flatten();
        assert_eq!(record.and_then(|r| r.result), Some(json!({ "v": 1 })));
    }

    #[tokio::test]
    async fn complete_missing_record_reports_not_found() {
        let repo = JobRepository::memory();
        let outcome = repo
            .complete(JobKind::AggregateChange, Uuid::now_v7(), json!({}))
            .await;
        assert_eq!(outcome.ok(), Some(WriteOutcome::NotFound));
    }

    #[tokio::test]
    async fn fail_does_not_touch_completed_record() {
        let (repo, ids) = repo_with(JobKind::Simulation, 1).await;
        let id = ids[0];
        let _ = repo.complete(JobKind::Simulation, id, json!({})).await;

        assert_eq!(repo.fail(JobKind::Simulation, id, "boom").await.ok(), Some(false));
        let record = repo.get(JobKind::Simulation, id).await.ok().flatten();
        assert_eq!(record.map(|r| r.status), Some(JobStatus::Complete));
    }

    #[tokio::test]
    async fn released_record_can_be_claimed_again() {
        let (repo, ids) = repo_with(JobKind::Simulation, 1).await;
        let id = ids[0];
        let _ = repo.claim_pending(JobKind::Simulation, 1).await;

        assert_eq!(repo.release(JobKind::Simulation, id).await.ok(), Some(true));
        let again = repo.claim_pending(JobKind::Simulation, 1).await.unwrap_or_default();
        assert_eq!(again.first().map(|r| r.attempts), Some(2));
    }

    #[tokio::test]
    async fn stale_claims_are_released() {
        let (repo, ids) = repo_with(JobKind::Simulation, 2).await;
        let _ = repo.claim_pending(JobKind::Simulation, 2).await;

        let JobRepository::Memory(mem) = &repo else {
            panic!("memory repository expected");
        };
        let long_ago = Utc::now() - Duration::hours(2);
        mem.set_claimed_at(JobKind::Simulation, ids[0], long_ago).await;

        let cutoff = Utc::now() - Duration::hours(1);
        let released = repo.release_stale(JobKind::Simulation, cutoff).await;
        assert_eq!(released.ok(), Some(1));

        let pending = repo
            .list(
                JobKind::Simulation,
                &ListFilter::first(10).with_status(JobStatus::Pending),
            )
            .await
            .unwrap_or_default();
        assert_eq!(pending.iter().map(|r| r.id).collect::<Vec<_>>(), vec![ids[0]]);
    }

    #[tokio::test]
    async fn list_is_newest_first_and_limited() {
        let (repo, ids) = repo_with(JobKind::Aggregate, 3).await;
        let listed = repo
            .list(JobKind::Aggregate, &ListFilter::first(2))
            .await
            .unwrap_or_default();
        assert_eq!(
            listed.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![ids[2], ids[1]]
        );

        let next = repo
            .list(JobKind::Aggregate, &ListFilter::first(2).skipping(2))
            .await
            .unwrap_or_default();
        assert_eq!(next.iter().map(|r| r.id).collect::<Vec<_>>(), vec![ids[0]]);
    }

    #[tokio::test]
    async fn list_filters_on_spec_ids() {
        let repo = JobRepository::memory();
        let sim_a = Uuid::now_v7();
        let sim_b = Uuid::now_v7();
        let mut of_a = Vec::new();
        for sim in [sim_a, sim_b, sim_a] {
            let spec = json!({ "simulation_id": sim, "variable": "income_tax" });
            let Ok(record) = repo.insert(JobKind::Aggregate, spec).await else {
                panic!("insert failed");
            };
            if sim == sim_a {
                of_a.push(record.id);
            }
        }
        of_a.reverse();

        let filter = ListFilter::first(10).with_spec_id("simulation_id", sim_a);
        let listed = repo.list(JobKind::Aggregate, &filter).await.unwrap_or_default();
        assert_eq!(listed.iter().map(|r| r.id).collect::<Vec<_>>(), of_a);

        let none = ListFilter::first(10).with_spec_id("simulation_id", Uuid::now_v7());
        assert!(repo.list(JobKind::Aggregate, &none).await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn insert_many_stores_pending_records() {
        let repo = JobRepository::memory();
        let records = repo
            .insert_many(JobKind::AggregateChange, vec![json!({ "n": 1 }), json!({ "n": 2 })])
            .await
            .unwrap_or_default();
        assert_eq!(records.len(), 2);
        for record in &records {
            let stored = repo.get(JobKind::AggregateChange, record.id).await.ok().flatten();
            assert_eq!(stored.map(|r| r.status), Some(JobStatus::Pending));
        }
    }

    #[tokio::test]
    async fn deferred_record_gets_its_attempt_back() {
        let (repo, ids) = repo_with(JobKind::Aggregate, 1).await;
        let id = ids[0];

        for _ in 0..3 {
            let claimed = repo.claim_pending(JobKind::Aggregate, 1).await.unwrap_or_default();
            assert_eq!(claimed.first().map(|r| r.attempts), Some(1));
            assert_eq!(repo.defer(JobKind::Aggregate, id).await.ok(), Some(true));
        }

        let record = repo.get(JobKind::Aggregate, id).await.ok().flatten();
        assert_eq!(record.map(|r| (r.status, r.attempts)), Some((JobStatus::Pending, 0)));

        // Only claimed records can be deferred.
        assert_eq!(repo.defer(JobKind::Aggregate, id).await.ok(), Some(false));
    }
}
