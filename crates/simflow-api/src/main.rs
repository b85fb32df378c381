//! Creation API binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`simflow.yaml` + environment)
//! 2. Initialize structured logging
//! 3. Open the job store (and apply migrations)
//! 4. Serve until `Ctrl-C` / `SIGTERM`
//! 5. Close the store

use std::sync::Arc;

use anyhow::Context;
use simflow_api::{AppState, build_router};
use simflow_core::{ModelRegistry, SimflowConfig};
use simflow_db::JobRepository;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SimflowConfig::load().context("failed to load configuration")?;
    simflow_server::init_tracing(&config);

    info!(
        host = %config.api.host,
        port = config.api.port,
        backend = ?config.database.backend,
        "simflow-api starting"
    );

    let repository = JobRepository::from_config(&config.database)
        .await
        .context("failed to open job store")?;
    let registry = ModelRegistry::from_config(&config.models);
    let state = Arc::new(AppState::new(repository.clone(), registry));

    let served = simflow_server::start_server(&config.api, build_router(state)).await;

    repository.close().await;
    served.context("creation API server failed")?;
    info!("simflow-api shutdown complete");
    Ok(())
}
