//! Errors raised while resolving or running a model.

use simflow_types::Country;

/// Failure of a model lookup or calculation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// No model is registered for the country.
    #[error("no model registered for country {0}")]
    UnknownCountry(String),

    /// The requested version is not registered for the country.
    #[error("model version {version} not found for country {country}")]
    UnknownVersion {
        /// Country of the request.
        country: Country,
        /// The rejected version string.
        version: String,
    },

    /// A policy override names a parameter the model does not have.
    #[error("unknown policy parameter: {0}")]
    UnknownParameter(String),

    /// A policy override is out of range.
    #[error("invalid value for policy parameter {name}: {reason}")]
    InvalidParameter {
        /// Parameter name.
        name: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// A calculation exceeded the decimal range.
    #[error("arithmetic overflow computing {0}")]
    Overflow(&'static str),
}

impl ModelError {
    /// Whether the error means the requested model version does not exist.
    ///
    /// Dispatch treats this as terminal: retrying cannot make the version
    /// appear.
    pub const fn is_version_not_found(&self) -> bool {
        matches!(self, Self::UnknownVersion { .. } | Self::UnknownCountry(_))
    }
}
