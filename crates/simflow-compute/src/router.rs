//! Axum router construction for the compute API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use simflow_server::{ping_routes, with_common_layers};

use crate::handlers;
use crate::state::AppState;

/// Build the complete router.
pub fn build_router(state: Arc<AppState>) -> Router {
    let health = Arc::clone(&state.health);

    let api = Router::new()
        .route(
            "/run_simulation_sync/{id}",
            post(handlers::run_simulation_sync),
        )
        .route("/process_aggregates", post(handlers::process_aggregates))
        .route(
            "/process_aggregate_changes",
            post(handlers::process_aggregate_changes),
        )
        .route(
            "/simulate/economy/comparison",
            post(handlers::economy_comparison),
        )
        .route("/versions", get(handlers::list_versions))
        .route("/versions/{country}", get(handlers::country_versions))
        .with_state(state);

    with_common_layers(api.merge(ping_routes(health)))
}
