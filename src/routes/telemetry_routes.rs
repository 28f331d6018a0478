use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use crate::controllers::telemetry_controller::TelemetryController;
use crate::dto::{ApiResponse, TelemetryAccepted, TelemetryBatchRequest, VehicleTripResponse};
use crate::middleware::TenantContext;
use crate::models::{Alert, TelemetryReading};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub fn create_telemetry_router() -> Router<AppState> {
    Router::new()
        .route("/telemetry", post(record_telemetry))
        .route("/telemetry/batch", post(record_telemetry_batch))
        .route("/vehicles/:vehicle_id/trip", get(get_active_trip))
        .route("/alerts/:alert_id/acknowledge", post(acknowledge_alert))
}

async fn record_telemetry(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(reading): Json<TelemetryReading>,
) -> Result<(StatusCode, Json<ApiResponse<TelemetryAccepted>>), AppError> {
    let controller = TelemetryController::new(&state);
    let response = controller.ingest(tenant.id(), reading).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn record_telemetry_batch(
    State(state): State<AppState>,
    tenant: TenantContext,
    Json(request): Json<TelemetryBatchRequest>,
) -> Result<(StatusCode, Json<ApiResponse<TelemetryAccepted>>), AppError> {
    let controller = TelemetryController::new(&state);
    let response = controller.ingest_batch(tenant.id(), request).await?;
    Ok((StatusCode::ACCEPTED, Json(response)))
}

async fn get_active_trip(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(vehicle_id): Path<String>,
) -> Result<Json<VehicleTripResponse>, AppError> {
    let controller = TelemetryController::new(&state);
    let response = controller.active_trip(tenant.id(), vehicle_id).await?;
    Ok(Json(response))
}

async fn acknowledge_alert(
    State(state): State<AppState>,
    tenant: TenantContext,
    Path(alert_id): Path<Uuid>,
) -> Result<Json<ApiResponse<Alert>>, AppError> {
    let controller = TelemetryController::new(&state);
    let response = controller.acknowledge_alert(tenant.id(), alert_id).await?;
    Ok(Json(response))
}
