//! Tracing subscriber setup.
//!
//! `RUST_LOG` wins when set; otherwise the configured level applies.
//! Desktop runs get human-readable lines, production runs get one JSON
//! object per line for the log collector.

use simflow_core::config::{LogFormat, SimflowConfig};
use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Later calls are ignored.
pub fn init_tracing(config: &SimflowConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match config.logging.effective_format(config.environment) {
        LogFormat::Json => builder.json().flatten_event(true).try_init(),
        LogFormat::Pretty => builder.try_init(),
    };

    if installed.is_ok() {
        tracing::info!(
            service = %config.service.name,
            instance_id = %config.service.instance_id,
            environment = ?config.environment,
            "Logging initialised"
        );
    }
}
