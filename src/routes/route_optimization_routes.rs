use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};

use crate::controllers::route_optimization_controller::RouteOptimizationController;
use crate::dto::ApiResponse;
use crate::middleware::TenantContext;
use crate::models::{OptimizedRoute, RouteOptimizationRequest};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_route_optimization_router() -> Router<AppState> {
    Router::new()
        .route("/optimize", post(optimize_route))
        .route("/:route_id/cache", delete(invalidate_route))
}

async fn optimize_route(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(request): Json<RouteOptimizationRequest>,
) -> Result<Json<ApiResponse<OptimizedRoute>>, AppError> {
    let controller = RouteOptimizationController::new(&state);
    let response = controller.optimize(tenant.id(), request).await?;
    Ok(Json(response))
}

async fn invalidate_route(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(route_id): Path<String>,
) -> Result<Json<ApiResponse<String>>, AppError> {
    let controller = RouteOptimizationController::new(&state);
    let response = controller.invalidate(tenant.id(), &route_id).await?;
    Ok(Json(response))
}
