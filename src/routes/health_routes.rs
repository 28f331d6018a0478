use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use crate::dto::HealthResponse;
use crate::state::AppState;

pub fn create_health_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let redis_connected = match &state.redis {
        Some(redis) => Some(redis.is_connected().await),
        None => None,
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        environment: state.config.environment.clone(),
        model_loaded: state.optimizer.has_model(),
        redis_connected,
        timestamp: chrono::Utc::now(),
    })
}

async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
