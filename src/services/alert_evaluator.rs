//! Evaluador de alertas
//!
//! Reglas de umbral sobre una sola lectura más pertenencia a geocercas.
//! Las reglas se evalúan en orden fijo y son independientes: una lectura
//! puede emitir cero, una o varias alertas. No hay deduplicación entre
//! lecturas; un vehículo que se mantiene sobre el umbral genera una alerta
//! por lectura.

use std::collections::HashMap;
use uuid::Uuid;

use crate::config::AlertThresholds;
use crate::models::{Alert, AlertKind, AlertSeverity, Geofence, TelemetryReading};

/// Estado de pertenencia por geocerca para un vehículo
pub type GeofenceContainment = HashMap<Uuid, bool>;

#[derive(Debug, Clone, Default)]
pub struct AlertEvaluator {
    thresholds: AlertThresholds,
}

impl AlertEvaluator {
    pub fn new(thresholds: AlertThresholds) -> Self {
        Self { thresholds }
    }

    pub fn thresholds(&self) -> &AlertThresholds {
        &self.thresholds
    }

    /// Reglas 1 y 2: exceso de velocidad y batería baja. Sin estado.
    pub fn evaluate_thresholds(&self, tenant_id: &str, reading: &TelemetryReading) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let location = reading.position();

        if reading.speed > self.thresholds.speeding_kmh {
            let severity = if reading.speed > self.thresholds.critical_speed_kmh {
                AlertSeverity::Critical
            } else {
                AlertSeverity::High
            };
            alerts.push(Alert::new(
                tenant_id,
                &reading.vehicle_id,
                AlertKind::Speeding,
                severity,
                format!(
                    "Vehicle {} at {:.1} km/h (limit {:.0} km/h)",
                    reading.vehicle_id, reading.speed, self.thresholds.speeding_kmh
                ),
                location,
                reading.timestamp,
            ));
        }

        if let Some(battery) = reading.battery_percent {
            if battery < self.thresholds.low_battery_percent {
                alerts.push(Alert::new(
                    tenant_id,
                    &reading.vehicle_id,
                    AlertKind::LowBattery,
                    AlertSeverity::Medium,
                    format!("Device {} battery at {:.0}%", reading.device_id, battery),
                    location,
                    reading.timestamp,
                ));
            }
        }

        alerts
    }

    /// Regla 3: transiciones de entrada/salida de geocercas activas.
    ///
    /// `containment` es el último estado conocido del vehículo y se actualiza
    /// aquí mismo. Una geocerca vista por primera vez solo inicializa su estado.
    pub fn evaluate_geofences(
        &self,
        tenant_id: &str,
        reading: &TelemetryReading,
        geofences: &[Geofence],
        containment: &mut GeofenceContainment,
    ) -> Vec<Alert> {
        let mut alerts = Vec::new();
        let location = reading.position();

        for fence in geofences.iter().filter(|f| f.is_active) {
            let inside = fence.contains(&location);
            let previous = containment.insert(fence.id, inside);

            let kind = match previous {
                Some(false) if inside && fence.alert_on_entry => AlertKind::GeofenceEntry,
                Some(true) if !inside && fence.alert_on_exit => AlertKind::GeofenceExit,
                _ => continue,
            };

            let verb = if kind == AlertKind::GeofenceEntry { "entered" } else { "left" };
            alerts.push(
                Alert::new(
                    tenant_id,
                    &reading.vehicle_id,
                    kind,
                    AlertSeverity::High,
                    format!("Vehicle {} {} geofence '{}'", reading.vehicle_id, verb, fence.name),
                    location,
                    reading.timestamp,
                )
                .with_geofence(fence.id),
            );
        }

        alerts
    }

    /// Todas las reglas en orden fijo
    pub fn evaluate(
        &self,
        tenant_id: &str,
        reading: &TelemetryReading,
        geofences: &[Geofence],
        containment: &mut GeofenceContainment,
    ) -> Vec<Alert> {
        let mut alerts = self.evaluate_thresholds(tenant_id, reading);
        alerts.extend(self.evaluate_geofences(tenant_id, reading, geofences, containment));
        alerts
    }
}
