//! Rastreador de viajes
//!
//! Máquina de estados por vehículo, `{NoTrip, Active}`, guiada por la señal
//! de encendido:
//!
//! - NoTrip + encendido     → abre viaje
//! - Active + encendido     → acumula distancia y velocidad máxima
//! - Active + apagado       → cierra viaje
//! - NoTrip + apagado       → sin cambios
//!
//! La falta de historial nunca descarta una lectura: sin posición previa el
//! tramo cuenta como 0 km.

use crate::models::{TelemetryReading, Trip, TripChange, TripStatus};
use crate::utils::geo_math;

use super::tracking_store::VehicleState;

/// Estado lógico del vehículo en la máquina de viajes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TripState {
    NoTrip,
    Active,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TripTracker;

impl TripTracker {
    pub fn new() -> Self {
        Self
    }

    pub fn state_of(state: &VehicleState) -> TripState {
        match &state.active_trip {
            Some(trip) if trip.is_active() => TripState::Active,
            _ => TripState::NoTrip,
        }
    }

    /// Distancia del tramo desde la última posición conocida
    fn leg_km(state: &VehicleState, reading: &TelemetryReading) -> f64 {
        match state.last_position {
            Some(previous) => {
                let delta = geo_math::distance_km(&previous, &reading.position());
                if delta.is_finite() {
                    delta
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    /// Aplicar una lectura al estado del vehículo.
    ///
    /// Actualiza también la última posición y marca de tiempo. El llamador
    /// debe haber descartado lecturas obsoletas (`VehicleState::is_stale`).
    pub fn apply(
        &self,
        tenant_id: &str,
        state: &mut VehicleState,
        reading: &TelemetryReading,
    ) -> Option<TripChange> {
        let change = match (Self::state_of(state), reading.ignition_on) {
            (TripState::NoTrip, true) => {
                let trip = Trip::open(
                    tenant_id,
                    &reading.vehicle_id,
                    reading.timestamp,
                    reading.position(),
                    reading.speed,
                );
                state.active_trip = Some(trip.clone());
                Some(TripChange::Started(trip))
            }
            (TripState::Active, true) => {
                let leg = Self::leg_km(state, reading);
                state.active_trip.as_mut().map(|trip| {
                    trip.total_distance_km += leg;
                    trip.max_speed = trip.max_speed.max(reading.speed);
                    TripChange::Updated(trip.clone())
                })
            }
            (TripState::Active, false) => {
                let leg = Self::leg_km(state, reading);
                state.active_trip.take().map(|mut trip| {
                    trip.total_distance_km += leg;
                    trip.max_speed = trip.max_speed.max(reading.speed);
                    trip.end_time = Some(reading.timestamp);
                    trip.end_location = Some(reading.position());
                    trip.status = TripStatus::Closed;
                    TripChange::Closed(trip)
                })
            }
            (TripState::NoTrip, false) => None,
        };

        state.last_position = Some(reading.position());
        state.last_timestamp = Some(reading.timestamp);
        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap()
    }

    fn reading(minute: i64, latitude: f64, longitude: f64, speed: f64, ignition_on: bool) -> TelemetryReading {
        TelemetryReading {
            vehicle_id: "VAN-3".to_string(),
            device_id: "DEV-3".to_string(),
            latitude,
            longitude,
            speed,
            heading: None,
            accuracy: None,
            satellite_count: None,
            odometer: None,
            ignition_on,
            battery_percent: None,
            timestamp: t0() + Duration::minutes(minute),
        }
    }

    #[test]
    fn test_ignition_on_opens_trip_without_history() {
        let tracker = TripTracker::new();
        let mut state = VehicleState::default();

        let change = tracker.apply("acme", &mut state, &reading(0, 48.85, 2.35, 0.0, true));
        match change {
            Some(TripChange::Started(trip)) => {
                assert_eq!(trip.start_time, t0());
                assert_eq!(trip.start_location, GeoPoint::new(48.85, 2.35));
                assert_eq!(trip.total_distance_km, 0.0);
                assert!(trip.end_time.is_none());
            }
            other => panic!("se esperaba Started, llegó {:?}", other),
        }
        assert_eq!(TripTracker::state_of(&state), TripState::Active);
    }

    #[test]
    fn test_ignition_off_without_trip_is_noop() {
        let tracker = TripTracker::new();
        let mut state = VehicleState::default();
        assert!(tracker.apply("acme", &mut state, &reading(0, 48.85, 2.35, 0.0, false)).is_none());
        assert_eq!(TripTracker::state_of(&state), TripState::NoTrip);
        assert_eq!(state.last_timestamp, Some(t0()));
    }

    #[test]
    fn test_full_trip_accumulates_haversine_distance() {
        let tracker = TripTracker::new();
        let mut state = VehicleState::default();
        let path = [
            reading(0, 48.8566, 2.3522, 0.0, true),
            reading(5, 48.8600, 2.3600, 45.0, true),
            reading(10, 48.8700, 2.3800, 72.0, true),
            reading(15, 48.8750, 2.3900, 30.0, false),
        ];

        let mut closed = None;
        for r in &path {
            if let Some(TripChange::Closed(trip)) = tracker.apply("acme", &mut state, r) {
                closed = Some(trip);
            }
        }

        let trip = closed.expect("el viaje debe cerrarse");
        let points: Vec<GeoPoint> = path.iter().map(|r| r.position()).collect();
        let expected = geo_math::path_distance_km(&points);
        assert!((trip.total_distance_km - expected).abs() < 1e-9);
        assert_eq!(trip.end_time, Some(t0() + Duration::minutes(15)));
        assert_eq!(trip.end_location, Some(GeoPoint::new(48.8750, 2.3900)));
        assert_eq!(trip.max_speed, 72.0);
        assert_eq!(trip.status, TripStatus::Closed);
        assert!(state.active_trip.is_none());
    }

    #[test]
    fn test_trips_never_overlap_and_one_open_at_most() {
        let tracker = TripTracker::new();
        let mut state = VehicleState::default();
        let ignition = [true, true, false, false, true, false, true, true, true, false, true];

        let mut trips: Vec<Trip> = Vec::new();
        for (minute, on) in ignition.iter().enumerate() {
            let r = reading(minute as i64, 48.0 + minute as f64 * 0.001, 2.0, 20.0, *on);
            match tracker.apply("acme", &mut state, &r) {
                Some(TripChange::Started(trip)) => trips.push(trip),
                Some(TripChange::Updated(trip)) | Some(TripChange::Closed(trip)) => {
                    let last = trips.last_mut().expect("update sin viaje abierto");
                    assert_eq!(last.trip_id, trip.trip_id);
                    *last = trip;
                }
                None => {}
            }
            let open = trips.iter().filter(|t| t.end_time.is_none()).count();
            assert!(open <= 1);
        }

        assert_eq!(trips.len(), 4);
        for pair in trips.windows(2) {
            let end = pair[0].end_time.expect("solo el último puede seguir abierto");
            assert!(end <= pair[1].start_time);
        }
        assert!(trips.last().unwrap().end_time.is_none());
    }
}
