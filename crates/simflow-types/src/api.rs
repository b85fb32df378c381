//! Request and response bodies of the HTTP surfaces.
//!
//! Shared by the servers (which serialize them) and by the dispatcher and
//! client (which deserialize them), so the two sides cannot drift.

use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::enums::{JobKind, JobStatus};

/// Returned by every creation endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct JobCreated {
    /// Identifier of the new record.
    pub id: Uuid,
    /// Kind of record created.
    pub kind: JobKind,
    /// Always `pending` at creation.
    pub status: JobStatus,
    /// Relative URL to poll for the result.
    pub poll_url: String,
}

/// Lightweight status projection for polling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct JobStatusView {
    /// Record identifier.
    pub id: Uuid,
    /// Record kind.
    pub kind: JobKind,
    /// Lifecycle state.
    pub status: JobStatus,
    /// Whether the result column is set.
    pub has_result: bool,
    /// Failure reason, if failed.
    pub error: Option<String>,
}

/// Outcome of a synchronous single-record compute call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct RunOutcome {
    /// Record identifier.
    pub id: Uuid,
    /// State after the call (always `complete` on success).
    pub status: JobStatus,
    /// Human-readable summary.
    pub message: String,
}

/// Body of the batch compute endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BatchRequest {
    /// Records to process, in order.
    pub ids: Vec<Uuid>,
}

/// Outcome of a batch compute call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BatchOutcome {
    /// Records whose result is now set (including ones already complete).
    pub completed: Vec<Uuid>,
    /// Records that could not run yet because an input is not complete.
    pub deferred: Vec<Uuid>,
    /// Records that failed.
    pub failed: Vec<BatchFailure>,
}

/// One failed item of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct BatchFailure {
    /// Record identifier.
    pub id: Uuid,
    /// Failure reason.
    pub error: String,
    /// True when retrying cannot succeed; the record has been marked failed.
    pub terminal: bool,
}

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ErrorBody {
    /// Human-readable message.
    pub error: String,
    /// HTTP status code, repeated in the body.
    pub status: u16,
    /// Machine-readable code for errors callers branch on.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// Error code sent with a 404 when the requested model version is unknown.
pub const MODEL_VERSION_NOT_FOUND: &str = "model_version_not_found";

/// Error code sent with a 404 when the record itself does not exist.
pub const RECORD_NOT_FOUND: &str = "record_not_found";

/// Known model versions for one country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct CountryVersions {
    /// Version that an unversioned request resolves to.
    pub latest: String,
    /// Every accepted version, sorted.
    pub versions: Vec<String>,
}

// ---------------------------------------------------------------------------
// Ping and health
// ---------------------------------------------------------------------------

/// Body of `POST /ping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PingRequest {
    /// Any integer.
    pub value: i64,
}

/// Reply to `POST /ping`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct PingResponse {
    /// The request value plus one.
    pub incremented: i64,
}

/// Result of one health probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ProbeStatus {
    /// Probe name.
    pub name: String,
    /// Whether the probe passed.
    pub healthy: bool,
    /// Detail, usually set only on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Health of one subsystem: healthy iff all its probes are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct SystemStatus {
    /// Subsystem name.
    pub name: String,
    /// Conjunction of the probe results.
    pub healthy: bool,
    /// Individual probe results.
    pub detail: Vec<ProbeStatus>,
}

/// Health of the whole service: healthy iff all systems are.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct HealthStatus {
    /// Conjunction of the system results.
    pub healthy: bool,
    /// Per-system results.
    pub systems: Vec<SystemStatus>,
}
