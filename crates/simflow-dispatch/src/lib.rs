//! Dispatch for the Simflow platform.
//!
//! Finds records whose result is still unset, claims them, and asks the
//! compute API to fill them in. Runs either as a fixed-interval loop or as
//! a single pass started by an external scheduler.
//!
//! # Modules
//!
//! - [`dispatcher`] -- [`Dispatcher`], the pass and the loop
//! - [`error`] -- [`DispatchError`]: transient vs terminal
//! - [`target`] -- [`ComputeTarget`]: HTTP or in-process compute

pub mod dispatcher;
pub mod error;
pub mod target;

pub use dispatcher::{Dispatcher, PassReport};
pub use error::DispatchError;
pub use target::{ComputeTarget, HttpComputeClient};
