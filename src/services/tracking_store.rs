//! Almacén de estado de rastreo por vehículo
//!
//! Reemplaza los mapas globales del proceso: cada vehículo tiene su propio
//! `Mutex`, de modo que todo el trabajo sobre un mismo vehículo se serializa
//! mientras vehículos distintos avanzan en paralelo.
//!
//! La primera vez que se bloquea un vehículo su estado se reconstruye desde
//! el repositorio (viaje abierto, última posición y marca de tiempo), así un
//! reinicio no abre un segundo viaje ni deja el anterior sin cerrar.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMappedMutexGuard, OwnedMutexGuard, RwLock};

use super::alert_evaluator::GeofenceContainment;
use crate::models::{GeoPoint, TelemetryReading, Trip, VehicleSnapshot};
use crate::repositories::FleetRepository;
use crate::utils::errors::AppResult;

/// Estado derivado de la telemetría de un vehículo
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehicleState {
    pub active_trip: Option<Trip>,
    pub last_position: Option<GeoPoint>,
    pub last_timestamp: Option<DateTime<Utc>>,
    pub geofences: GeofenceContainment,
}

impl VehicleState {
    /// La lectura no es posterior a la última aplicada
    pub fn is_stale(&self, reading: &TelemetryReading) -> bool {
        matches!(self.last_timestamp, Some(last) if reading.timestamp <= last)
    }
}

impl From<VehicleSnapshot> for VehicleState {
    fn from(snapshot: VehicleSnapshot) -> Self {
        Self {
            active_trip: snapshot.active_trip,
            last_position: snapshot.last_position,
            last_timestamp: snapshot.last_timestamp,
            geofences: GeofenceContainment::default(),
        }
    }
}

/// Entrada del almacén; `restored` indica que ya se leyó del repositorio
#[derive(Debug, Default)]
pub struct VehicleSlot {
    restored: bool,
    state: VehicleState,
}

/// Acceso exclusivo al estado de un vehículo
pub type VehicleGuard = OwnedMappedMutexGuard<VehicleSlot, VehicleState>;

type VehicleKey = (String, String);

#[derive(Clone)]
pub struct TrackingStore {
    repository: Arc<dyn FleetRepository>,
    vehicles: Arc<RwLock<HashMap<VehicleKey, Arc<Mutex<VehicleSlot>>>>>,
}

impl TrackingStore {
    pub fn new(repository: Arc<dyn FleetRepository>) -> Self {
        Self {
            repository,
            vehicles: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    async fn slot(&self, tenant_id: &str, vehicle_id: &str) -> Arc<Mutex<VehicleSlot>> {
        let key = (tenant_id.to_string(), vehicle_id.to_string());
        if let Some(slot) = self.vehicles.read().await.get(&key) {
            return slot.clone();
        }

        let mut vehicles = self.vehicles.write().await;
        vehicles.entry(key).or_default().clone()
    }

    /// Adquirir acceso exclusivo al estado de un vehículo.
    ///
    /// Si el estado aún no se ha restaurado y el repositorio falla, se
    /// devuelve el error y el siguiente intento vuelve a leerlo.
    pub async fn lock(&self, tenant_id: &str, vehicle_id: &str) -> AppResult<VehicleGuard> {
        let mut slot = self.slot(tenant_id, vehicle_id).await.lock_owned().await;

        if !slot.restored {
            let snapshot = self.repository.load_vehicle_state(tenant_id, vehicle_id).await?;
            if let Some(trip) = &snapshot.active_trip {
                log::info!("🔁 Viaje {} restaurado para {}/{}", trip.trip_id, tenant_id, vehicle_id);
            }
            slot.state = VehicleState::from(snapshot);
            slot.restored = true;
        }

        Ok(OwnedMutexGuard::map(slot, |slot| &mut slot.state))
    }

    /// Copia del estado actual, si el vehículo ya fue restaurado en memoria
    pub async fn snapshot(&self, tenant_id: &str, vehicle_id: &str) -> Option<VehicleState> {
        let key = (tenant_id.to_string(), vehicle_id.to_string());
        let slot = self.vehicles.read().await.get(&key).cloned()?;
        let slot = slot.lock().await;
        slot.restored.then(|| slot.state.clone())
    }

    /// Viaje abierto; para vehículos aún no vistos se consulta el repositorio
    pub async fn active_trip(&self, tenant_id: &str, vehicle_id: &str) -> AppResult<Option<Trip>> {
        if let Some(state) = self.snapshot(tenant_id, vehicle_id).await {
            return Ok(state.active_trip);
        }
        Ok(self.repository.load_vehicle_state(tenant_id, vehicle_id).await?.active_trip)
    }

    pub async fn vehicle_count(&self) -> usize {
        self.vehicles.read().await.len()
    }
}
