//! Modelos del sistema
//!
//! Este módulo contiene los modelos de datos del rastreo de flota:
//! lecturas de telemetría, viajes, alertas, geocercas y rutas optimizadas.

pub mod alert;
pub mod geofence;
pub mod prediction;
pub mod route;
pub mod telemetry;
pub mod trip;

use serde::{Deserialize, Serialize};

pub use alert::*;
pub use geofence::*;
pub use prediction::*;
pub use route::*;
pub use telemetry::*;
pub use trip::*;

/// Punto geográfico en grados decimales
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Coordenadas finitas y dentro de rango
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}
