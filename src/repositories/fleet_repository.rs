//! Colaborador de persistencia de la flota
//!
//! Filas de telemetría, viajes, alertas y rutas optimizadas son de solo
//! inserción salvo el cierre de viaje y el reconocimiento de alertas.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{
    Alert, Geofence, OptimizedRoute, TelemetryReading, Trip, TripChange, VehicleSnapshot,
};
use crate::utils::errors::{not_found_error, AppResult};

#[async_trait]
pub trait FleetRepository: Send + Sync {
    async fn insert_telemetry(&self, tenant_id: &str, reading: &TelemetryReading) -> AppResult<()>;

    async fn insert_trip(&self, trip: &Trip) -> AppResult<()>;

    async fn update_trip(&self, trip: &Trip) -> AppResult<()>;

    async fn insert_alert(&self, alert: &Alert) -> AppResult<()>;

    async fn acknowledge_alert(&self, tenant_id: &str, alert_id: Uuid) -> AppResult<Alert>;

    async fn list_geofences(&self, tenant_id: &str) -> AppResult<Vec<Geofence>>;

    async fn insert_optimized_route(&self, route: &OptimizedRoute) -> AppResult<()>;

    /// Viaje abierto y última lectura persistida de un vehículo
    async fn load_vehicle_state(&self, tenant_id: &str, vehicle_id: &str) -> AppResult<VehicleSnapshot>;

    /// Persistir todos los efectos de una lectura.
    ///
    /// Las implementaciones con transacciones deben hacerlo de forma atómica.
    async fn persist_reading(
        &self,
        tenant_id: &str,
        reading: &TelemetryReading,
        alerts: &[Alert],
        trip_change: Option<&TripChange>,
    ) -> AppResult<()> {
        self.insert_telemetry(tenant_id, reading).await?;
        for alert in alerts {
            self.insert_alert(alert).await?;
        }
        match trip_change {
            Some(TripChange::Started(trip)) => self.insert_trip(trip).await?,
            Some(TripChange::Updated(trip)) | Some(TripChange::Closed(trip)) => self.update_trip(trip).await?,
            None => {}
        }
        Ok(())
    }
}

#[derive(Default)]
struct FleetTables {
    telemetry: Vec<(String, TelemetryReading)>,
    trips: HashMap<Uuid, Trip>,
    alerts: HashMap<Uuid, Alert>,
    geofences: Vec<Geofence>,
    routes: Vec<OptimizedRoute>,
}

/// Repositorio en memoria para pruebas y ejecución local sin PostgreSQL
#[derive(Clone, Default)]
pub struct InMemoryFleetRepository {
    tables: Arc<RwLock<FleetTables>>,
}

impl InMemoryFleetRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_geofence(&self, geofence: Geofence) {
        self.tables.write().await.geofences.push(geofence);
    }

    pub async fn telemetry_count(&self, tenant_id: &str) -> usize {
        let tables = self.tables.read().await;
        tables.telemetry.iter().filter(|(t, _)| t == tenant_id).count()
    }

    pub async fn trips(&self, tenant_id: &str, vehicle_id: &str) -> Vec<Trip> {
        let tables = self.tables.read().await;
        let mut trips: Vec<Trip> = tables
            .trips
            .values()
            .filter(|t| t.tenant_id == tenant_id && t.vehicle_id == vehicle_id)
            .cloned()
            .collect();
        trips.sort_by_key(|t| t.start_time);
        trips
    }

    pub async fn alerts(&self, tenant_id: &str) -> Vec<Alert> {
        let tables = self.tables.read().await;
        let mut alerts: Vec<Alert> = tables
            .alerts
            .values()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect();
        alerts.sort_by_key(|a| a.timestamp);
        alerts
    }

    pub async fn routes(&self, tenant_id: &str) -> Vec<OptimizedRoute> {
        let tables = self.tables.read().await;
        tables.routes.iter().filter(|r| r.tenant_id == tenant_id).cloned().collect()
    }
}

#[async_trait]
impl FleetRepository for InMemoryFleetRepository {
    async fn insert_telemetry(&self, tenant_id: &str, reading: &TelemetryReading) -> AppResult<()> {
        self.tables
            .write()
            .await
            .telemetry
            .push((tenant_id.to_string(), reading.clone()));
        Ok(())
    }

    async fn insert_trip(&self, trip: &Trip) -> AppResult<()> {
        self.tables.write().await.trips.insert(trip.trip_id, trip.clone());
        Ok(())
    }

    async fn update_trip(&self, trip: &Trip) -> AppResult<()> {
        let mut tables = self.tables.write().await;
        match tables.trips.get_mut(&trip.trip_id) {
            Some(existing) => {
                *existing = trip.clone();
                Ok(())
            }
            None => Err(not_found_error("Trip", &trip.trip_id.to_string())),
        }
    }

    async fn insert_alert(&self, alert: &Alert) -> AppResult<()> {
        self.tables.write().await.alerts.insert(alert.id, alert.clone());
        Ok(())
    }

    async fn acknowledge_alert(&self, tenant_id: &str, alert_id: Uuid) -> AppResult<Alert> {
        let mut tables = self.tables.write().await;
        match tables.alerts.get_mut(&alert_id) {
            Some(alert) if alert.tenant_id == tenant_id => {
                alert.acknowledged = true;
                Ok(alert.clone())
            }
            _ => Err(not_found_error("Alert", &alert_id.to_string())),
        }
    }

    async fn list_geofences(&self, tenant_id: &str) -> AppResult<Vec<Geofence>> {
        let tables = self.tables.read().await;
        Ok(tables
            .geofences
            .iter()
            .filter(|g| g.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn insert_optimized_route(&self, route: &OptimizedRoute) -> AppResult<()> {
        self.tables.write().await.routes.push(route.clone());
        Ok(())
    }

    async fn load_vehicle_state(&self, tenant_id: &str, vehicle_id: &str) -> AppResult<VehicleSnapshot> {
        let tables = self.tables.read().await;
        let active_trip = tables
            .trips
            .values()
            .filter(|t| t.tenant_id == tenant_id && t.vehicle_id == vehicle_id && t.is_active())
            .max_by_key(|t| t.start_time)
            .cloned();
        let last = tables
            .telemetry
            .iter()
            .filter(|(t, r)| t == tenant_id && r.vehicle_id == vehicle_id)
            .map(|(_, r)| r)
            .max_by_key(|r| r.timestamp);

        Ok(VehicleSnapshot {
            active_trip,
            last_position: last.map(TelemetryReading::position),
            last_timestamp: last.map(|r| r.timestamp),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertKind, AlertSeverity, GeoPoint};
    use crate::utils::AppError;
    use chrono::Utc;

    fn alert(tenant_id: &str) -> Alert {
        Alert::new(
            tenant_id,
            "VAN-1",
            AlertKind::LowBattery,
            AlertSeverity::Medium,
            "battery".to_string(),
            GeoPoint::new(1.0, 1.0),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_acknowledge_alert_is_tenant_scoped() {
        let repo = InMemoryFleetRepository::new();
        let alert = alert("acme");
        repo.insert_alert(&alert).await.unwrap();

        let err = repo.acknowledge_alert("globex", alert.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let acked = repo.acknowledge_alert("acme", alert.id).await.unwrap();
        assert!(acked.acknowledged);
        assert!(repo.alerts("acme").await[0].acknowledged);
    }

    #[tokio::test]
    async fn test_persist_reading_applies_trip_change() {
        let repo = InMemoryFleetRepository::new();
        let mut trip = Trip::open("acme", "VAN-1", Utc::now(), GeoPoint::new(1.0, 1.0), 0.0);
        let reading = TelemetryReading {
            vehicle_id: "VAN-1".to_string(),
            device_id: "DEV".to_string(),
            latitude: 1.0,
            longitude: 1.0,
            speed: 0.0,
            heading: None,
            accuracy: None,
            satellite_count: None,
            odometer: None,
            ignition_on: true,
            battery_percent: None,
            timestamp: Utc::now(),
        };

        repo.persist_reading("acme", &reading, &[], Some(&TripChange::Started(trip.clone())))
            .await
            .unwrap();
        trip.total_distance_km = 3.5;
        repo.persist_reading("acme", &reading, &[alert("acme")], Some(&TripChange::Updated(trip.clone())))
            .await
            .unwrap();

        assert_eq!(repo.telemetry_count("acme").await, 2);
        assert_eq!(repo.trips("acme", "VAN-1").await, vec![trip]);
        assert_eq!(repo.alerts("acme").await.len(), 1);
    }

    #[tokio::test]
    async fn test_load_vehicle_state_returns_open_trip_and_last_reading() {
        let repo = InMemoryFleetRepository::new();
        let start = Utc::now();
        let trip = Trip::open("acme", "VAN-1", start, GeoPoint::new(1.0, 1.0), 20.0);
        repo.insert_trip(&trip).await.unwrap();

        let mut closed = Trip::open("acme", "VAN-1", start - chrono::Duration::hours(2), GeoPoint::new(0.0, 0.0), 0.0);
        closed.status = crate::models::TripStatus::Closed;
        repo.insert_trip(&closed).await.unwrap();

        for (seconds, latitude) in [(30, 1.5), (10, 1.1)] {
            let reading = TelemetryReading {
                vehicle_id: "VAN-1".to_string(),
                device_id: "DEV".to_string(),
                latitude,
                longitude: 1.0,
                speed: 20.0,
                heading: None,
                accuracy: None,
                satellite_count: None,
                odometer: None,
                ignition_on: true,
                battery_percent: None,
                timestamp: start + chrono::Duration::seconds(seconds),
            };
            repo.insert_telemetry("acme", &reading).await.unwrap();
        }

        let snapshot = repo.load_vehicle_state("acme", "VAN-1").await.unwrap();
        assert_eq!(snapshot.active_trip, Some(trip));
        assert_eq!(snapshot.last_position, Some(GeoPoint::new(1.5, 1.0)));
        assert_eq!(snapshot.last_timestamp, Some(start + chrono::Duration::seconds(30)));

        let unknown = repo.load_vehicle_state("globex", "VAN-1").await.unwrap();
        assert_eq!(unknown, VehicleSnapshot::default());
    }
}
