use serde::{Deserialize, Serialize};

use crate::models::Trip;

// Response de lecturas aceptadas para procesamiento asíncrono
#[derive(Debug, Serialize, Deserialize)]
pub struct TelemetryAccepted {
    pub tenant_id: String,
    pub accepted: usize,
}

// Request de lote de lecturas
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TelemetryBatchRequest {
    pub readings: Vec<crate::models::TelemetryReading>,
}

// Response del viaje activo de un vehículo
#[derive(Debug, Serialize, Deserialize)]
pub struct VehicleTripResponse {
    pub vehicle_id: String,
    pub active_trip: Option<Trip>,
}

// Response del health check
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub environment: String,
    pub model_loaded: bool,
    pub redis_connected: Option<bool>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}
