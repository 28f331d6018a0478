//! Modelo de optimización de rutas
//!
//! Solicitud de optimización (origen, destino, paradas) y la ruta
//! optimizada resultante con su horario de waypoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{GeoPoint, Prediction};

/// Perfil de vehículo usado por el predictor
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleType {
    #[default]
    Generic,
    Car,
    Van,
    Truck,
    Motorcycle,
}

impl VehicleType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VehicleType::Generic => "generic",
            VehicleType::Car => "car",
            VehicleType::Van => "van",
            VehicleType::Truck => "truck",
            VehicleType::Motorcycle => "motorcycle",
        }
    }

    /// Valor numérico del tipo en el vector de características
    pub fn feature_flag(&self) -> f64 {
        match self {
            VehicleType::Generic => 0.0,
            VehicleType::Car => 1.0,
            VehicleType::Van => 2.0,
            VehicleType::Truck => 3.0,
            VehicleType::Motorcycle => 4.0,
        }
    }
}

/// Ventana horaria de entrega
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant <= self.end
    }
}

/// Parada de entrega a secuenciar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct DeliveryStop {
    #[serde(default)]
    pub id: Option<String>,
    pub location: GeoPoint,
    /// Mayor valor = más urgente
    #[validate(range(min = 1))]
    pub priority: u32,
    #[serde(default)]
    pub time_window: Option<TimeWindow>,
}

/// Restricciones de la solicitud
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConstraints {
    #[serde(default)]
    pub max_duration_min: Option<f64>,
    #[serde(default)]
    pub max_distance_km: Option<f64>,
    #[serde(default)]
    pub avoid_tolls: bool,
    #[serde(default)]
    pub prefer_highways: bool,
}

/// Solicitud de optimización de ruta
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct RouteOptimizationRequest {
    #[validate(length(min = 1, max = 128))]
    pub route_id: String,
    pub origin: GeoPoint,
    pub destination: GeoPoint,
    #[serde(default)]
    #[validate]
    pub stops: Vec<DeliveryStop>,
    #[serde(default)]
    pub vehicle_type: Option<VehicleType>,
    #[serde(default)]
    pub departure_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub constraints: RouteConstraints,
    /// Nivel de tráfico [0, 1]; si falta se deriva de la hora de salida
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub traffic_level: Option<f64>,
    /// Severidad meteorológica [0, 1]
    #[serde(default)]
    #[validate(range(min = 0.0, max = 1.0))]
    pub weather_severity: Option<f64>,
}

/// Tipo de waypoint dentro de la ruta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WaypointKind {
    Origin,
    Stop,
    Destination,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Waypoint {
    /// Empieza en 1, estrictamente creciente y contiguo
    pub sequence_number: u32,
    pub kind: WaypointKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    pub location: GeoPoint,
    pub arrival_time: DateTime<Utc>,
    pub departure_time: DateTime<Utc>,
}

/// Candidato alternativo; pista de diversidad, no una re-optimización
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeRoute {
    pub label: String,
    pub total_distance_km: f64,
    pub estimated_duration_min: f64,
    pub optimization_score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptimizedRoute {
    pub route_id: String,
    pub tenant_id: String,
    pub vehicle_type: VehicleType,
    pub waypoints: Vec<Waypoint>,
    pub total_distance_km: f64,
    /// Distancia en el orden original de la solicitud
    pub base_distance_km: f64,
    pub estimated_duration_min: f64,
    pub estimated_fuel_cost: f64,
    /// Puntuación en [0, 100]
    pub optimization_score: f64,
    pub alternative_routes: Vec<AlternativeRoute>,
    pub prediction: Prediction,
    #[serde(default)]
    pub constraint_warnings: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl OptimizedRoute {
    /// Waypoints entre origen y destino
    pub fn intermediate_stops(&self) -> impl Iterator<Item = &Waypoint> {
        self.waypoints.iter().filter(|w| w.kind == WaypointKind::Stop)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request: RouteOptimizationRequest = serde_json::from_value(serde_json::json!({
            "route_id": "R-1",
            "origin": { "latitude": 48.85, "longitude": 2.35 },
            "destination": { "latitude": 48.86, "longitude": 2.36 }
        }))
        .unwrap();

        assert!(request.stops.is_empty());
        assert!(request.vehicle_type.is_none());
        assert_eq!(request.constraints, RouteConstraints::default());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_without_destination_is_rejected() {
        let result = serde_json::from_value::<RouteOptimizationRequest>(serde_json::json!({
            "route_id": "R-1",
            "origin": { "latitude": 48.85, "longitude": 2.35 }
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_zero_priority_stop_fails_validation() {
        let request: RouteOptimizationRequest = serde_json::from_value(serde_json::json!({
            "route_id": "R-1",
            "origin": { "latitude": 48.85, "longitude": 2.35 },
            "destination": { "latitude": 48.86, "longitude": 2.36 },
            "stops": [{ "location": { "latitude": 48.9, "longitude": 2.4 }, "priority": 0 }]
        }))
        .unwrap();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_vehicle_type_flags_are_distinct() {
        let flags: Vec<f64> = [
            VehicleType::Generic,
            VehicleType::Car,
            VehicleType::Van,
            VehicleType::Truck,
            VehicleType::Motorcycle,
        ]
        .iter()
        .map(|t| t.feature_flag())
        .collect();
        assert_eq!(flags, vec![0.0, 1.0, 2.0, 3.0, 4.0]);
    }
}
