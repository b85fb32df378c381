//! Shared application state for the creation API.

use std::sync::Arc;

use simflow_core::ModelRegistry;
use simflow_db::JobRepository;
use simflow_server::HealthRegistry;

/// Everything a handler needs: the store and the model registry.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Persistent store.
    pub repository: JobRepository,
    /// Known model versions.
    pub registry: ModelRegistry,
    /// Probes behind `/ping/alive`.
    pub health: Arc<HealthRegistry>,
}

impl AppState {
    /// State over `repository` with a health registry that probes it.
    pub fn new(repository: JobRepository, registry: ModelRegistry) -> Self {
        let health = HealthRegistry::new().with_system(
            "store",
            vec![simflow_server::Probe::Database(repository.clone())],
        );
        Self {
            repository,
            registry,
            health: Arc::new(health),
        }
    }
}
