//! Shared application state for the compute API.

use std::sync::Arc;

use simflow_server::{HealthRegistry, Probe};

use crate::service::ComputeService;

/// Compute service plus the probes behind `/ping/alive`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Runs models and writes results.
    pub service: ComputeService,
    /// Store probe, plus the model service when the backend is remote.
    pub health: Arc<HealthRegistry>,
}

impl AppState {
    /// State over `service`, probing its store and any remote model.
    pub fn new(service: ComputeService) -> Self {
        let mut health = HealthRegistry::new()
            .with_system("store", vec![Probe::Database(service.repository().clone())]);
        if let Some(url) = service.backend().remote_url() {
            health = health.with_system("model", vec![Probe::http(format!("{url}/ping/started"))]);
        }
        Self {
            service,
            health: Arc::new(health),
        }
    }
}
