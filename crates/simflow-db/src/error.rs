//! Error types for the persistent store.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] errors with context about which operation failed.

use simflow_types::UnknownVariant;

/// Errors that can occur in the persistent store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored column holds a value this version does not understand.
    #[error("Corrupt row: {0}")]
    Corrupt(#[from] UnknownVariant),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
