//! Modelo de geocerca
//!
//! Región poligonal con nombre usada para alertas de entrada/salida.
//! Entrada de solo lectura para el evaluador de alertas.

use geo::{Contains, Coord, LineString, Point, Polygon};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::GeoPoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geofence {
    pub id: Uuid,
    pub tenant_id: String,
    pub name: String,
    /// Anillo exterior; el cierre del anillo es implícito
    pub polygon: Vec<GeoPoint>,
    pub alert_on_entry: bool,
    pub alert_on_exit: bool,
    pub is_active: bool,
}

impl Geofence {
    /// Polígono `geo` con x = longitud, y = latitud
    pub fn to_polygon(&self) -> Polygon<f64> {
        let ring: Vec<Coord<f64>> = self
            .polygon
            .iter()
            .map(|p| Coord { x: p.longitude, y: p.latitude })
            .collect();
        Polygon::new(LineString::from(ring), vec![])
    }

    /// Prueba punto-en-polígono; un punto sobre el borde cuenta como fuera
    pub fn contains(&self, point: &GeoPoint) -> bool {
        if self.polygon.len() < 3 {
            return false;
        }
        self.to_polygon()
            .contains(&Point::new(point.longitude, point.latitude))
    }
}
