//! Modelo de alertas
//!
//! Las alertas son de solo inserción; únicamente `acknowledged` cambia,
//! y lo hace un actor externo.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::GeoPoint;

/// Tipo de alerta
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    Speeding,
    LowBattery,
    GeofenceEntry,
    GeofenceExit,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::Speeding => "speeding",
            AlertKind::LowBattery => "low_battery",
            AlertKind::GeofenceEntry => "geofence_entry",
            AlertKind::GeofenceExit => "geofence_exit",
        }
    }
}

/// Severidad de la alerta
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Low => "low",
            AlertSeverity::Medium => "medium",
            AlertSeverity::High => "high",
            AlertSeverity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: Uuid,
    pub tenant_id: String,
    pub vehicle_id: String,
    pub kind: AlertKind,
    pub severity: AlertSeverity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geofence_id: Option<Uuid>,
    pub message: String,
    pub location: GeoPoint,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

impl Alert {
    pub fn new(
        tenant_id: &str,
        vehicle_id: &str,
        kind: AlertKind,
        severity: AlertSeverity,
        message: String,
        location: GeoPoint,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            vehicle_id: vehicle_id.to_string(),
            kind,
            severity,
            geofence_id: None,
            message,
            location,
            timestamp,
            acknowledged: false,
        }
    }

    pub fn with_geofence(mut self, geofence_id: Uuid) -> Self {
        self.geofence_id = Some(geofence_id);
        self
    }
}
