//! Domain logic shared by the Simflow services.
//!
//! Nothing in this crate performs I/O beyond reading configuration; the
//! model and aggregation functions are pure so that the compute API can
//! re-run them any number of times with the same outcome.
//!
//! # Modules
//!
//! - [`config`] -- Layered configuration (`simflow.yaml` + environment)
//!   into strongly-typed structs.
//! - [`registry`] -- Known model versions per country and `latest`
//!   resolution.
//! - [`model`] -- The reference flat tax-benefit model.
//! - [`aggregate`] -- Weighted aggregation over simulation output.
//! - [`retry`] -- Exponential backoff policy and async retry helper.
//! - [`error`] -- [`ModelError`].
//!
//! [`ModelError`]: error::ModelError

pub mod aggregate;
pub mod config;
pub mod error;
pub mod model;
pub mod registry;
pub mod retry;

pub use aggregate::{aggregate, aggregate_change};
pub use config::{ConfigError, SimflowConfig};
pub use error::ModelError;
pub use model::{PolicyParameters, ReferenceModel};
pub use registry::ModelRegistry;
pub use retry::{RetryPolicy, Retryable, retry};
