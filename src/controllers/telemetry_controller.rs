use std::sync::Arc;
use uuid::Uuid;

use crate::dto::{ApiResponse, TelemetryAccepted, TelemetryBatchRequest, VehicleTripResponse};
use crate::models::{Alert, TelemetryReading};
use crate::repositories::FleetRepository;
use crate::services::{TelemetryProcessor, TelemetryService};
use crate::state::AppState;
use crate::utils::errors::AppError;

pub struct TelemetryController {
    service: TelemetryService,
    processor: Arc<TelemetryProcessor>,
    repository: Arc<dyn FleetRepository>,
}

impl TelemetryController {
    pub fn new(state: &AppState) -> Self {
        Self {
            service: state.telemetry.clone(),
            processor: state.processor.clone(),
            repository: state.repository.clone(),
        }
    }

    pub async fn ingest(
        &self,
        tenant_id: &str,
        reading: TelemetryReading,
    ) -> Result<ApiResponse<TelemetryAccepted>, AppError> {
        self.service.record(tenant_id, &reading).await?;

        Ok(ApiResponse::success(TelemetryAccepted {
            tenant_id: tenant_id.to_string(),
            accepted: 1,
        }))
    }

    pub async fn ingest_batch(
        &self,
        tenant_id: &str,
        request: TelemetryBatchRequest,
    ) -> Result<ApiResponse<TelemetryAccepted>, AppError> {
        let accepted = self.service.record_batch(tenant_id, &request.readings).await?;

        Ok(ApiResponse::success_with_message(
            TelemetryAccepted {
                tenant_id: tenant_id.to_string(),
                accepted,
            },
            format!("{} lecturas encoladas", accepted),
        ))
    }

    pub async fn active_trip(&self, tenant_id: &str, vehicle_id: String) -> Result<VehicleTripResponse, AppError> {
        let active_trip = self.processor.active_trip(tenant_id, &vehicle_id).await?;
        Ok(VehicleTripResponse { vehicle_id, active_trip })
    }

    pub async fn acknowledge_alert(&self, tenant_id: &str, alert_id: Uuid) -> Result<ApiResponse<Alert>, AppError> {
        let alert = self.repository.acknowledge_alert(tenant_id, alert_id).await?;
        log::info!("✅ Alerta {} reconocida", alert_id);

        Ok(ApiResponse::success_with_message(
            alert,
            "Alerta reconocida".to_string(),
        ))
    }
}
