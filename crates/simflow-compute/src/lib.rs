//! Compute API for the Simflow platform.
//!
//! Dispatch calls this service to turn pending records into results. It
//! loads the record, runs the model or the aggregation, and writes the
//! result back through the write-once store operation.
//!
//! # Modules
//!
//! - [`backend`] -- [`ModelBackend`]: in-process or remote model
//! - [`comparison`] -- Stateless economy comparison
//! - [`error`] -- [`ComputeError`] and its HTTP mapping
//! - [`handlers`] -- Endpoint handlers
//! - [`router`] -- [`build_router`]
//! - [`service`] -- [`ComputeService`]
//! - [`state`] -- [`AppState`]

pub mod backend;
pub mod comparison;
pub mod error;
pub mod handlers;
pub mod router;
pub mod service;
pub mod state;

pub use backend::{ModelBackend, RemoteModel};
pub use comparison::{ComparisonRequest, ComparisonResponse};
pub use error::ComputeError;
pub use router::build_router;
pub use service::{ComputeService, ItemOutcome};
pub use state::AppState;
