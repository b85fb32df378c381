//! Typed client for the Simflow creation API.
//!
//! ```no_run
//! # async fn demo(spec: simflow_types::SimulationSpec) -> Result<(), simflow_client::ClientError> {
//! use std::time::Duration;
//!
//! let client = simflow_client::SimflowClient::new("http://localhost:8000")?;
//! let created = client.create_simulation(&spec).await?;
//! let result = client
//!     .wait_for_simulation(created.id, Duration::from_secs(5), Duration::from_secs(600))
//!     .await?;
//! println!("net income: {}", result.totals.net_income);
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;

pub use client::{Polled, SimflowClient, UNAVAILABLE_ATTEMPTS, UNAVAILABLE_DELAY};
pub use error::ClientError;
