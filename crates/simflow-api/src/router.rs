//! Axum router construction for the creation API.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use simflow_server::{ping_routes, with_common_layers};

use crate::handlers;
use crate::state::AppState;

/// Build the complete router.
///
/// - `POST|GET /simulations`, `GET /simulations/{id}`, `GET /simulations/{id}/status`
/// - `POST|GET /aggregates`, `POST /aggregates/bulk`, `GET /aggregates/{id}`,
///   `GET /aggregates/{id}/status`
/// - `POST|GET /aggregate-changes`, `POST /aggregate-changes/bulk`,
///   `GET /aggregate-changes/{id}`, `GET /aggregate-changes/{id}/status`
/// - `GET /versions`, `GET /versions/{country}`
/// - `POST /ping`, `GET /ping/started`, `GET /ping/alive`
pub fn build_router(state: Arc<AppState>) -> Router {
    let health = Arc::clone(&state.health);

    let api = Router::new()
        .route(
            "/simulations",
            get(handlers::list_simulations).post(handlers::create_simulation),
        )
        .route("/simulations/{id}", get(handlers::get_simulation))
        .route("/simulations/{id}/status", get(handlers::simulation_status))
        .route(
            "/aggregates",
            get(handlers::list_aggregates).post(handlers::create_aggregate),
        )
        .route("/aggregates/bulk", post(handlers::create_aggregates_bulk))
        .route("/aggregates/{id}", get(handlers::get_aggregate))
        .route("/aggregates/{id}/status", get(handlers::aggregate_status))
        .route(
            "/aggregate-changes",
            get(handlers::list_aggregate_changes).post(handlers::create_aggregate_change),
        )
        .route(
            "/aggregate-changes/bulk",
            post(handlers::create_aggregate_changes_bulk),
        )
        .route("/aggregate-changes/{id}", get(handlers::get_aggregate_change))
        .route(
            "/aggregate-changes/{id}/status",
            get(handlers::aggregate_change_status),
        )
        .route("/versions", get(handlers::list_versions))
        .route("/versions/{country}", get(handlers::country_versions))
        .with_state(state);

    with_common_layers(api.merge(ping_routes(health)))
}
