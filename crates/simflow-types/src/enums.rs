//! Enumeration types shared across the platform.
//!
//! String forms are stable `snake_case` because they are stored in the
//! database (`status` column) and appear in URLs (`JobKind::path`).

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

/// Returned when a string does not name a known enum variant.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownVariant {
    /// The enum being parsed (e.g. `job status`).
    pub kind: &'static str,
    /// The rejected input.
    pub value: String,
}

// ---------------------------------------------------------------------------
// Job kind
// ---------------------------------------------------------------------------

/// The three unit-of-work entity kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum JobKind {
    /// A household-microdata simulation run.
    Simulation,
    /// A single aggregate over one simulation's output.
    Aggregate,
    /// The difference of one aggregate between two simulations.
    AggregateChange,
}

impl JobKind {
    /// Every kind, in dispatch order. Simulations go first because
    /// aggregates and changes read their results.
    pub const ALL: [Self; 3] = [Self::Simulation, Self::Aggregate, Self::AggregateChange];

    /// Backing table name.
    pub const fn table(self) -> &'static str {
        match self {
            Self::Simulation => "simulations",
            Self::Aggregate => "aggregates",
            Self::AggregateChange => "aggregate_changes",
        }
    }

    /// URL collection segment used by the creation API.
    pub const fn path(self) -> &'static str {
        match self {
            Self::Simulation => "simulations",
            Self::Aggregate => "aggregates",
            Self::AggregateChange => "aggregate-changes",
        }
    }

    /// Stable `snake_case` name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simulation => "simulation",
            Self::Aggregate => "aggregate",
            Self::AggregateChange => "aggregate_change",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Job status
// ---------------------------------------------------------------------------

/// Lifecycle of a unit-of-work record.
///
/// ```text
/// pending --claim--> in_progress --complete--> complete
///    ^                   |
///    +----release--------+--fail--> failed
/// ```
///
/// `complete` and `failed` are terminal for the dispatcher. A record only
/// reaches `complete` through the write-once result update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum JobStatus {
    /// Created, waiting for dispatch.
    Pending,
    /// Claimed by a dispatcher, computation requested.
    InProgress,
    /// Result written.
    Complete,
    /// Permanently failed; `error` holds the reason.
    Failed,
}

impl JobStatus {
    /// Stable `snake_case` name, as stored in the `status` column.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Whether no further dispatch will touch this record.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownVariant {
                kind: "job status",
                value: other.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Country
// ---------------------------------------------------------------------------

/// A country with a registered tax-benefit model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
#[ts(export, export_to = "bindings/")]
pub enum Country {
    /// United States.
    Us,
    /// United Kingdom.
    Uk,
}

impl Country {
    /// Lowercase country code.
    pub const fn code(self) -> &'static str {
        match self {
            Self::Us => "us",
            Self::Uk => "uk",
        }
    }
}

impl fmt::Display for Country {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Country {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "us" => Ok(Self::Us),
            "uk" => Ok(Self::Uk),
            _ => Err(UnknownVariant {
                kind: "country",
                value: s.to_owned(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Aggregation
// ---------------------------------------------------------------------------

/// A per-household variable produced by a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum Variable {
    /// Gross employment income (input).
    EmploymentIncome,
    /// Income tax owed.
    IncomeTax,
    /// Benefits received.
    Benefits,
    /// Income after tax and benefits.
    NetIncome,
    /// Number of people in the household (input).
    Members,
}

/// How household values are combined into one number.
///
/// All functions use household weights.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "snake_case")]
#[ts(export, export_to = "bindings/")]
pub enum AggregateFunction {
    /// Weighted total.
    Sum,
    /// Weighted mean.
    Mean,
    /// Weighted household count.
    Count,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_column_form() {
        for status in [
            JobStatus::Pending,
            JobStatus::InProgress,
            JobStatus::Complete,
            JobStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<JobStatus>(), Ok(status));
        }
        assert!("done".parse::<JobStatus>().is_err());
    }

    #[test]
    fn status_serde_matches_column_form() {
        let json = serde_json::to_string(&JobStatus::InProgress).unwrap_or_default();
        assert_eq!(json, "\"in_progress\"");
    }

    #[test]
    fn terminal_states() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Complete.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }

    #[test]
    fn country_parses_case_insensitively() {
        assert_eq!(" US ".parse::<Country>(), Ok(Country::Us));
        assert_eq!("uk".parse::<Country>(), Ok(Country::Uk));
        let err = "fr".parse::<Country>().err();
        assert_eq!(err.map(|e| e.to_string()), Some("unknown country: fr".to_owned()));
    }

    #[test]
    fn kind_paths_and_tables() {
        assert_eq!(JobKind::AggregateChange.path(), "aggregate-changes");
        assert_eq!(JobKind::AggregateChange.table(), "aggregate_changes");
        assert_eq!(JobKind::ALL.first(), Some(&JobKind::Simulation));
    }
}
