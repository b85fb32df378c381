//! Creation API for the Simflow platform.
//!
//! Clients submit simulations, aggregates, and aggregate changes here and
//! poll them until the result is set. Submission stores a pending record
//! and returns immediately; dispatch and the compute API fill in the
//! result later.
//!
//! # Modules
//!
//! - [`handlers`] -- Endpoint handlers
//! - [`router`] -- [`build_router`]
//! - [`state`] -- [`AppState`]

pub mod handlers;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
