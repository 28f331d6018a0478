//! Modelo de Trip
//!
//! Un viaje es un intervalo contiguo con encendido activo para un vehículo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::GeoPoint;

/// Estado del viaje
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripStatus {
    Active,
    Closed,
}

impl TripStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Active => "active",
            TripStatus::Closed => "closed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub trip_id: Uuid,
    pub tenant_id: String,
    pub vehicle_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub start_location: GeoPoint,
    pub end_location: Option<GeoPoint>,
    pub total_distance_km: f64,
    pub max_speed: f64,
    pub status: TripStatus,
}

impl Trip {
    pub fn open(
        tenant_id: &str,
        vehicle_id: &str,
        start_time: DateTime<Utc>,
        start_location: GeoPoint,
        speed: f64,
    ) -> Self {
        Self {
            trip_id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            vehicle_id: vehicle_id.to_string(),
            start_time,
            end_time: None,
            start_location,
            end_location: None,
            total_distance_km: 0.0,
            max_speed: speed,
            status: TripStatus::Active,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == TripStatus::Active
    }
}

/// Cambio producido por el TripTracker al aplicar una lectura
#[derive(Debug, Clone, PartialEq)]
pub enum TripChange {
    Started(Trip),
    Updated(Trip),
    Closed(Trip),
}

impl TripChange {
    pub fn trip(&self) -> &Trip {
        match self {
            TripChange::Started(trip) | TripChange::Updated(trip) | TripChange::Closed(trip) => trip,
        }
    }
}
