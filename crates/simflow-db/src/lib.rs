//! Persistent store for Simflow unit-of-work records.
//!
//! Simulations, aggregates, and aggregate changes each live in their own
//! table with the same job columns. The creation API inserts rows, the
//! dispatcher claims and settles them, and the compute API writes results.
//!
//! # Architecture
//!
//! ```text
//! creation API ──insert──►┐
//!                         │
//! dispatcher ──claim/release/fail──► JobRepository ─┬─► PgJobRepository (PostgreSQL)
//!                         │                          └─► MemoryJobRepository
//! compute API ──complete─►┘
//! ```
//!
//! # Modules
//!
//! - [`repository`] -- [`JobRepository`], [`ListFilter`], and [`WriteOutcome`]
//! - [`postgres`] -- `PostgreSQL` pool, configuration, and queries
//! - [`memory`] -- In-process store for development and tests
//! - [`error`] -- Shared error types

pub mod error;
pub mod memory;
pub mod postgres;
pub mod repository;

// Re-export primary types for convenience.
pub use error::DbError;
pub use memory::MemoryJobRepository;
pub use postgres::{PgJobRepository, PostgresConfig};
pub use repository::{JobRepository, ListFilter, WriteOutcome};
