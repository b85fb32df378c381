//! Dispatch binary.
//!
//! # Startup Sequence
//!
//! 1. Load configuration (`simflow.yaml` + environment)
//! 2. Initialize structured logging
//! 3. Open the job store
//! 4. `poll`: run passes until `Ctrl-C` / `SIGTERM`;
//!    `trigger`: run one pass and exit
//! 5. Close the store

use anyhow::Context;
use simflow_core::SimflowConfig;
use simflow_core::config::DispatchMode;
use simflow_db::JobRepository;
use simflow_dispatch::Dispatcher;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = SimflowConfig::load().context("failed to load configuration")?;
    simflow_server::init_tracing(&config);

    info!(
        mode = ?config.dispatch.mode,
        compute_url = %config.dispatch.compute_url,
        in_process = config.dispatch.in_process,
        "simflow-dispatch starting"
    );

    let repository = JobRepository::from_config(&config.database)
        .await
        .context("failed to open job store")?;
    let dispatcher = Dispatcher::from_config(&config, repository.clone())
        .context("failed to build dispatcher")?;

    let outcome = match config.dispatch.mode {
        DispatchMode::Poll => {
            dispatcher.run(simflow_server::shutdown_signal()).await;
            Ok(())
        }
        DispatchMode::Trigger => dispatcher.run_pass().await.map(|report| {
            info!(
                claimed = report.claimed,
                completed = report.completed,
                failed = report.failed,
                "Triggered pass complete"
            );
        }),
    };

    repository.close().await;
    outcome.context("dispatch pass failed")?;
    info!("simflow-dispatch shutdown complete");
    Ok(())
}
