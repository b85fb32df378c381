//! Compute API binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`simflow.yaml` + environment)
//! 2. Initialize structured logging
//! 3. Open the job store and build the model backend
//! 4. Serve until `Ctrl-C` / `SIGTERM`
//! 5. Close the store

use std::sync::Arc;

use anyhow::Context;
use simflow_compute::{AppState, ComputeService, ModelBackend, build_router};
use simflow_core::{ModelRegistry, SimflowConfig};
use simflow_db::JobRepository;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SimflowConfig::load().context("failed to load configuration")?;
    simflow_server::init_tracing(&config);

    let backend =
        ModelBackend::from_config(&config.compute).context("failed to build model backend")?;
    let listen = config.compute.listen();

    info!(
        host = %listen.host,
        port = listen.port,
        backend = backend.name(),
        "simflow-compute starting"
    );

    let repository = JobRepository::from_config(&config.database)
        .await
        .context("failed to open job store")?;
    let registry = ModelRegistry::from_config(&config.models);
    let service = ComputeService::new(repository.clone(), registry, backend);
    let state = Arc::new(AppState::new(service));

    let served = simflow_server::start_server(&listen, build_router(state)).await;

    repository.close().await;
    served.context("compute API server failed")?;
    info!("simflow-compute shutdown complete");
    Ok(())
}
