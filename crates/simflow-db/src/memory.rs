//! In-process job repository.
//!
//! Holds every record in a map behind one lock, so each operation is atomic
//! with respect to the others exactly like a single-statement `UPDATE` in
//! `PostgreSQL`. Used for local development (`database.backend = memory`)
//! and throughout the test suites.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use simflow_types::{JobKind, JobRecord, JobStatus};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::repository::{ListFilter, WriteOutcome};

type Tables = BTreeMap<JobKind, BTreeMap<Uuid, JobRecord>>;

/// Job repository backed by process memory. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct MemoryJobRepository {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryJobRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn insert(&self, record: JobRecord) {
        self.tables
            .write()
            .await
            .entry(record.kind)
            .or_default()
            .insert(record.id, record);
    }

    pub(crate) async fn get(&self, kind: JobKind, id: Uuid) -> Option<JobRecord> {
        self.tables
            .read()
            .await
            .get(&kind)
            .and_then(|table| table.get(&id))
            .cloned()
    }

    pub(crate) async fn insert_many(&self, records: Vec<JobRecord>) {
        let mut tables = self.tables.write().await;
        for record in records {
            tables
                .entry(record.kind)
                .or_default()
                .insert(record.id, record);
        }
    }

    pub(crate) async fn list(&self, kind: JobKind, filter: &ListFilter) -> Vec<JobRecord> {
        let tables = self.tables.read().await;
        let Some(table) = tables.get(&kind) else {
            return Vec::new();
        };
        let mut records: Vec<&JobRecord> = table.values().filter(|r| filter.matches(r)).collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        records
            .into_iter()
            .skip(usize::try_from(filter.skip).unwrap_or(usize::MAX))
            .take(usize::try_from(filter.limit).unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    pub(crate) async fn claim_pending(&self, kind: JobKind, limit: u32) -> Vec<JobRecord> {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&kind) else {
            return Vec::new();
        };

        let mut pending: Vec<&mut JobRecord> = table
            .values_mut()
            .filter(|r| r.status == JobStatus::Pending && r.result.is_none())
            .collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        let now = Utc::now();
        pending
            .into_iter()
            .take(usize::try_from(limit).unwrap_or(usize::MAX))
            .map(|record| {
                record.status = JobStatus::InProgress;
                record.claimed_at = Some(now);
                record.attempts = record.attempts.saturating_add(1);
                record.clone()
            })
            .collect()
    }

    pub(crate) async fn complete(
        &self,
        kind: JobKind,
        id: Uuid,
        result: serde_json::Value,
    ) -> WriteOutcome {
        let mut tables = self.tables.write().await;
        let Some(record) = tables.get_mut(&kind).and_then(|t| t.get_mut(&id)) else {
            return WriteOutcome::NotFound;
        };
        if record.result.is_some() {
            return WriteOutcome::AlreadyComplete;
        }
        record.result = Some(result);
        record.status = JobStatus::Complete;
        record.error = None;
        record.claimed_at = None;
        record.completed_at = Some(Utc::now());
        WriteOutcome::Written
    }

    pub(crate) async fn fail(&self, kind: JobKind, id: Uuid, error: &str) -> bool {
        self.update(kind, id, |record| {
            if record.result.is_some() {
                return false;
            }
            record.status = JobStatus::Failed;
            record.error = Some(error.to_owned());
            record.claimed_at = None;
            true
        })
        .await
    }

    pub(crate) async fn release(&self, kind: JobKind, id: Uuid) -> bool {
        self.update(kind, id, |record| {
            if record.status != JobStatus::InProgress || record.result.is_some() {
                return false;
            }
            record.status = JobStatus::Pending;
            record.claimed_at = None;
            true
        })
        .await
    }

    pub(crate) async fn defer(&self, kind: JobKind, id: Uuid) -> bool {
        self.update(kind, id, |record| {
            if record.status != JobStatus::InProgress || record.result.is_some() {
                return false;
            }
            record.status = JobStatus::Pending;
            record.claimed_at = None;
            record.attempts = record.attempts.saturating_sub(1).max(0);
            true
        })
        .await
    }

    pub(crate) async fn release_stale(&self, kind: JobKind, older_than: DateTime<Utc>) -> u64 {
        let mut tables = self.tables.write().await;
        let Some(table) = tables.get_mut(&kind) else {
            return 0;
        };
        let mut released: u64 = 0;
        for record in table.values_mut() {
            let stale = record.claimed_at.is_some_and(|at| at < older_than);
            if record.status == JobStatus::InProgress && record.result.is_none() && stale {
                record.status = JobStatus::Pending;
                record.claimed_at = None;
                released = released.saturating_add(1);
            }
        }
        released
    }

    /// Overwrite a record's claim time. Lets tests age a claim without
    /// waiting out the lease.
    pub async fn set_claimed_at(&self, kind: JobKind, id: Uuid, at: DateTime<Utc>) -> bool {
        self.update(kind, id, |record| {
            record.claimed_at = Some(at);
            true
        })
        .await
    }

    async fn update(&self, kind: JobKind, id: Uuid, f: impl FnOnce(&mut JobRecord) -> bool) -> bool {
        let mut tables = self.tables.write().await;
        tables
            .get_mut(&kind)
            .and_then(|table| table.get_mut(&id))
            .is_some_and(f)
    }
}
