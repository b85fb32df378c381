//! Model backends.
//!
//! Uses enum dispatch instead of trait objects because async methods are
//! not dyn-compatible in Rust.

use std::time::Duration;

use reqwest::StatusCode;
use serde::Serialize;
use simflow_core::ReferenceModel;
use simflow_core::config::{ComputeConfig, ModelBackendKind};
use simflow_types::{SimulationResult, SimulationSpec};

use crate::error::ComputeError;

/// A tax-benefit model that turns a spec into a result.
#[derive(Debug, Clone)]
pub enum ModelBackend {
    /// In-process reference model.
    Reference(ReferenceModel),
    /// External model service over HTTP.
    Remote(RemoteModel),
}

impl ModelBackend {
    /// Build the backend selected by the `compute` config section.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::Remote`] if the remote backend is selected
    /// without a URL or its HTTP client cannot be built.
    pub fn from_config(config: &ComputeConfig) -> Result<Self, ComputeError> {
        match config.backend {
            ModelBackendKind::Reference => Ok(Self::Reference(ReferenceModel::new())),
            ModelBackendKind::Remote => {
                let url = config.remote_url.as_deref().ok_or_else(|| {
                    ComputeError::Remote("compute.remote_url is not set".to_owned())
                })?;
                let model =
                    RemoteModel::new(url, Duration::from_secs(config.remote_timeout_secs))?;
                Ok(Self::Remote(model))
            }
        }
    }

    /// Run the model.
    ///
    /// # Errors
    ///
    /// [`ComputeError::ModelVersionNotFound`] if the model does not have
    /// `version`, [`ComputeError::InvalidSpec`] if it rejects the spec,
    /// [`ComputeError::Remote`] if a remote call fails transiently.
    pub async fn simulate(
        &self,
        spec: &SimulationSpec,
        version: &str,
    ) -> Result<SimulationResult, ComputeError> {
        match self {
            Self::Reference(model) => model
                .simulate(spec, version)
                .map_err(|e| ComputeError::from_model(&e)),
            Self::Remote(model) => model.simulate(spec, version).await,
        }
    }

    /// Human-readable name for logging.
    pub const fn name(&self) -> &str {
        match self {
            Self::Reference(_) => "reference",
            Self::Remote(_) => "remote",
        }
    }

    /// Base URL of the remote service, if any. Used for health probes.
    pub fn remote_url(&self) -> Option<&str> {
        match self {
            Self::Reference(_) => None,
            Self::Remote(model) => Some(&model.base_url),
        }
    }
}

impl Default for ModelBackend {
    fn default() -> Self {
        Self::Reference(ReferenceModel::new())
    }
}

#[derive(Serialize)]
struct RemoteRequest<'a> {
    model_version: &'a str,
    spec: &'a SimulationSpec,
}

/// Backend for an external model service.
///
/// Sends `POST {base_url}/simulate` with `{ "model_version", "spec" }` and
/// expects a [`SimulationResult`] back. A 404 means the service does not
/// have the requested version.
#[derive(Debug, Clone)]
pub struct RemoteModel {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteModel {
    /// Create a backend for the service at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`ComputeError::Remote`] if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ComputeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ComputeError::Remote(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
        })
    }

    async fn simulate(
        &self,
        spec: &SimulationSpec,
        version: &str,
    ) -> Result<SimulationResult, ComputeError> {
        let url = format!("{}/simulate", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&RemoteRequest {
                model_version: version,
                spec,
            })
            .send()
            .await
            .map_err(|e| ComputeError::Remote(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ComputeError::ModelVersionNotFound(format!(
                "model version {version} not found for country {}",
                spec.country
            )));
        }
        if !status.is_success() {
            let error_body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read error body".to_owned());
            let message = format!("model service returned {status}: {error_body}");
            return Err(if status.is_client_error() {
                ComputeError::InvalidSpec(message)
            } else {
                ComputeError::Remote(message)
            });
        }

        response
            .json::<SimulationResult>()
            .await
            .map_err(|e| ComputeError::Remote(format!("model response parse failed: {e}")))
    }
}
