//! Shared type definitions for the Simflow platform.
//!
//! This crate is the single source of truth for the types that cross crate
//! and process boundaries: stored records, input specs, computed results,
//! and HTTP bodies. Public DTOs are exported to `TypeScript` via `ts-rs`.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for entity identifiers
//! - [`enums`] -- Job kind, job status, country, aggregation enums
//! - [`specs`] -- Input specifications with validation rules
//! - [`outputs`] -- Computed results
//! - [`records`] -- Stored rows and typed views
//! - [`api`] -- HTTP request/response bodies

pub mod api;
pub mod enums;
pub mod ids;
pub mod outputs;
pub mod records;
pub mod specs;

// Re-export all public types at crate root for convenience.
pub use api::{
    BatchFailure, BatchOutcome, BatchRequest, CountryVersions, ErrorBody, HealthStatus,
    JobCreated, JobStatusView, MODEL_VERSION_NOT_FOUND, PingRequest, PingResponse, ProbeStatus,
    RECORD_NOT_FOUND, RunOutcome, SystemStatus,
};
pub use enums::{AggregateFunction, Country, JobKind, JobStatus, UnknownVariant, Variable};
pub use ids::{AggregateChangeId, AggregateId, SimulationId};
pub use outputs::{
    AggregateChangeOutput, AggregateOutput, HouseholdOutput, SimulationResult, SimulationTotals,
};
pub use records::{Aggregate, AggregateChange, JobRecord, Simulation};
pub use specs::{
    AggregateChangeSpec, AggregateSpec, Household, MAX_HOUSEHOLDS, RangeFilter, SimulationSpec,
};

#[cfg(test)]
mod tests {
    //! `TypeScript` binding generation.

    #[test]
    fn export_bindings() {
        // ts-rs writes the files to `bindings/` relative to the crate root.
        use ts_rs::TS;

        let _ = crate::ids::SimulationId::export_all();
        let _ = crate::ids::AggregateId::export_all();
        let _ = crate::ids::AggregateChangeId::export_all();
        let _ = crate::records::Simulation::export_all();
        let _ = crate::records::Aggregate::export_all();
        let _ = crate::records::AggregateChange::export_all();
        let _ = crate::api::JobCreated::export_all();
        let _ = crate::api::JobStatusView::export_all();
        let _ = crate::api::HealthStatus::export_all();
        let _ = crate::api::CountryVersions::export_all();
    }
}
