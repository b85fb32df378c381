//! Shared HTTP plumbing for the Simflow services.
//!
//! The creation API and the compute API are separate binaries with the same
//! outer shape: a JSON error type, ping/health routes, CORS and request
//! tracing, and graceful shutdown. That shape lives here.
//!
//! # Modules
//!
//! - [`error`] -- [`ApiError`] and its HTTP mapping
//! - [`health`] -- [`HealthRegistry`] and probes
//! - [`ping`] -- `/ping`, `/ping/started`, `/ping/alive`
//! - [`server`] -- Bind, serve, and shutdown
//! - [`telemetry`] -- Tracing subscriber setup
//!
//! [`ApiError`]: error::ApiError
//! [`HealthRegistry`]: health::HealthRegistry

pub mod error;
pub mod health;
pub mod ping;
pub mod server;
pub mod telemetry;

pub use error::ApiError;
pub use health::{HealthRegistry, Probe};
pub use ping::ping_routes;
pub use server::{ServerError, bind, serve, shutdown_signal, start_server, with_common_layers};
pub use telemetry::init_tracing;
