//! Stored unit-of-work records and their typed projections.
//!
//! The store is kind-agnostic: every table holds a [`JobRecord`] whose spec
//! and result are JSON. The API layer projects a record into the typed view
//! for its kind ([`Simulation`], [`Aggregate`], [`AggregateChange`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::enums::{JobKind, JobStatus};
use crate::ids::{AggregateChangeId, AggregateId, SimulationId};
use crate::outputs::{AggregateChangeOutput, AggregateOutput, SimulationResult};
use crate::specs::{AggregateChangeSpec, AggregateSpec, SimulationSpec};

/// A row of any unit-of-work table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    /// Primary key.
    pub id: Uuid,
    /// Which table the row lives in.
    pub kind: JobKind,
    /// Input specification as submitted.
    pub spec: serde_json::Value,
    /// Computed result. Null until the single write by the compute API.
    pub result: Option<serde_json::Value>,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Failure reason when `status` is `failed`.
    pub error: Option<String>,
    /// Number of times a dispatcher has claimed this row.
    pub attempts: i32,
    /// When the current claim was taken, if in progress.
    pub claimed_at: Option<DateTime<Utc>>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// When the result was written.
    pub completed_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// A fresh pending record with no result.
    pub fn pending(kind: JobKind, spec: serde_json::Value) -> Self {
        Self {
            id: Uuid::now_v7(),
            kind,
            spec,
            result: None,
            status: JobStatus::Pending,
            error: None,
            attempts: 0,
            claimed_at: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Whether the result column has been written.
    pub const fn has_result(&self) -> bool {
        self.result.is_some()
    }
}

/// Generates a typed view of a [`JobRecord`] for one entity kind.
macro_rules! define_view {
    (
        $(#[$meta:meta])*
        $name:ident, $id:ty, $spec:ty, $output:ty
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
        #[ts(export, export_to = "bindings/")]
        pub struct $name {
            /// Record identifier.
            pub id: $id,
            /// Input specification.
            pub spec: $spec,
            /// Computed result; `None` until the record completes.
            pub result: Option<$output>,
            /// Lifecycle state.
            pub status: JobStatus,
            /// Failure reason, if failed.
            pub error: Option<String>,
            /// Dispatch attempts so far.
            pub attempts: i32,
            /// Creation time.
            pub created_at: DateTime<Utc>,
            /// Completion time.
            pub completed_at: Option<DateTime<Utc>>,
        }

        impl TryFrom<JobRecord> for $name {
            type Error = serde_json::Error;

            fn try_from(record: JobRecord) -> Result<Self, Self::Error> {
                Ok(Self {
                    id: <$id>::from(record.id),
                    spec: serde_json::from_value(record.spec)?,
                    result: record.result.map(serde_json::from_value).transpose()?,
                    status: record.status,
                    error: record.error,
                    attempts: record.attempts,
                    created_at: record.created_at,
                    completed_at: record.completed_at,
                })
            }
        }
    };
}

define_view! {
    /// A simulation record with typed spec and result.
    Simulation, SimulationId, SimulationSpec, SimulationResult
}

define_view! {
    /// An aggregate record with typed spec and result.
    Aggregate, AggregateId, AggregateSpec, AggregateOutput
}

define_view! {
    /// An aggregate-change record with typed spec and result.
    AggregateChange, AggregateChangeId, AggregateChangeSpec, AggregateChangeOutput
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::enums::{AggregateFunction, Variable};

    #[test]
    fn pending_record_has_no_result() {
        let record = JobRecord::pending(JobKind::Simulation, serde_json::json!({}));
        assert_eq!(record.status, JobStatus::Pending);
        assert!(!record.has_result());
        assert_eq!(record.attempts, 0);
    }

    #[test]
    fn view_projection_decodes_spec_and_result() {
        let spec = AggregateSpec {
            simulation_id: SimulationId::new(),
            variable: Variable::IncomeTax,
            function: AggregateFunction::Sum,
            filter: None,
        };
        let mut record = JobRecord::pending(
            JobKind::Aggregate,
            serde_json::to_value(&spec).unwrap_or_default(),
        );
        record.result = Some(serde_json::json!({ "value": "12.5" }));
        record.status = JobStatus::Complete;

        let view = Aggregate::try_from(record.clone());
        let Ok(view) = view else {
            panic!("aggregate view should decode");
        };
        assert_eq!(view.id.into_inner(), record.id);
        assert_eq!(view.spec, spec);
        assert_eq!(
            view.result.map(|r| r.value),
            Some(Decimal::new(125, 1))
        );
    }

    #[test]
    fn view_projection_rejects_foreign_spec() {
        let record = JobRecord::pending(JobKind::Simulation, serde_json::json!({ "nope": 1 }));
        assert!(Simulation::try_from(record).is_err());
    }
}
