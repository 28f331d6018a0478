//! Modelo de lectura de telemetría
//!
//! Una muestra GPS/sensor con marca de tiempo enviada por el dispositivo
//! del vehículo. Inmutable una vez registrada.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use super::{GeoPoint, Trip};

/// Lectura de telemetría tal como llega del dispositivo
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TelemetryReading {
    #[validate(length(min = 1, max = 64))]
    pub vehicle_id: String,

    #[validate(length(min = 1, max = 64))]
    pub device_id: String,

    /// Rango [-90, 90]; verificado en `utils::validation::validate_reading`
    pub latitude: f64,

    /// Rango [-180, 180]
    pub longitude: f64,

    /// Velocidad en km/h
    #[validate(range(min = 0.0))]
    pub speed: f64,

    #[serde(default)]
    pub heading: Option<f64>,

    #[serde(default)]
    pub accuracy: Option<f64>,

    #[serde(default)]
    pub satellite_count: Option<u32>,

    #[serde(default)]
    pub odometer: Option<f64>,

    pub ignition_on: bool,

    #[serde(default)]
    #[validate(range(min = 0.0, max = 100.0))]
    pub battery_percent: Option<f64>,

    pub timestamp: DateTime<Utc>,
}

impl TelemetryReading {
    pub fn position(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// Resultado del procesamiento de una lectura
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessingOutcome {
    /// La lectura se aplicó al estado del vehículo
    Applied { alerts: usize, trip_changed: bool },
    /// Timestamp anterior o igual a la última lectura aplicada
    Stale,
}

/// Último estado persistido de un vehículo
///
/// Se usa para reconstruir el seguimiento tras un reinicio. La pertenencia a
/// geocercas no se persiste: se reinicializa con la primera lectura.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleSnapshot {
    pub active_trip: Option<Trip>,
    pub last_position: Option<GeoPoint>,
    pub last_timestamp: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn reading_json() -> serde_json::Value {
        serde_json::json!({
            "vehicle_id": "VAN-01",
            "device_id": "DEV-9",
            "latitude": 48.85,
            "longitude": 2.35,
            "speed": 42.0,
            "ignition_on": true,
            "battery_percent": 80.0,
            "timestamp": "2024-05-01T08:00:00Z"
        })
    }

    #[test]
    fn test_deserialize_minimal_reading() {
        let reading: TelemetryReading = serde_json::from_value(reading_json()).unwrap();
        assert_eq!(reading.vehicle_id, "VAN-01");
        assert_eq!(reading.timestamp, Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap());
        assert!(reading.heading.is_none());
        assert!(reading.validate().is_ok());

        let mut drained = reading.clone();
        drained.battery_percent = Some(140.0);
        assert!(drained.validate().is_err());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let mut value = reading_json();
        value["fuel_level"] = serde_json::json!(12);
        assert!(serde_json::from_value::<TelemetryReading>(value).is_err());
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let mut value = reading_json();
        value.as_object_mut().unwrap().remove("ignition_on");
        assert!(serde_json::from_value::<TelemetryReading>(value).is_err());
    }
}
