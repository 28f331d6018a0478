pub mod health_routes;
pub mod route_optimization_routes;
pub mod telemetry_routes;

use axum::Router;

use crate::middleware::cors::cors_middleware;
use crate::state::AppState;

/// Router completo de la API
pub fn create_router(state: AppState) -> Router {
    let cors = cors_middleware(&state.config.cors_origins);

    Router::new()
        .merge(health_routes::create_health_router())
        .nest("/api", telemetry_routes::create_telemetry_router())
        .nest("/api/routes", route_optimization_routes::create_route_optimization_router())
        .layer(cors)
        .with_state(state)
}
