//! Cálculos geoespaciales
//!
//! Distancia de gran círculo (haversine) y aritmética de ETA.
//! Funciones puras, sin estado.

use chrono::{DateTime, Duration, Utc};

use crate::models::GeoPoint;

/// Radio medio de la Tierra en kilómetros
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Velocidad mínima usada para ETA cuando el vehículo reporta estar parado
pub const MIN_AVERAGE_SPEED_KMH: f64 = 5.0;

/// Distancia haversine entre dos puntos en km.
///
/// Un NaN en cualquier coordenada produce NaN; no se convierte a 0.
pub fn distance_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    // Orden canónico: distance_km(a, b) y distance_km(b, a) son idénticos bit a bit
    let (a, b) = if (b.latitude, b.longitude) < (a.latitude, a.longitude) {
        (b, a)
    } else {
        (a, b)
    };

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);

    // min(1.0) evita asin(>1) por error de redondeo en puntos antipodales
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Suma de las distancias de cada tramo consecutivo
pub fn path_distance_km(points: &[GeoPoint]) -> f64 {
    points
        .windows(2)
        .map(|leg| distance_km(&leg[0], &leg[1]))
        .sum()
}

/// Velocidad efectiva para ETA, con piso de `MIN_AVERAGE_SPEED_KMH`
pub fn effective_speed_kmh(avg_speed_kmh: f64) -> f64 {
    if avg_speed_kmh.is_finite() && avg_speed_kmh > MIN_AVERAGE_SPEED_KMH {
        avg_speed_kmh
    } else {
        MIN_AVERAGE_SPEED_KMH
    }
}

/// ETA desde `now` recorriendo `distance_km` a `avg_speed_kmh`
pub fn eta_from_distance_at(
    now: DateTime<Utc>,
    distance_km: f64,
    avg_speed_kmh: f64,
) -> DateTime<Utc> {
    let hours = distance_km.max(0.0) / effective_speed_kmh(avg_speed_kmh);
    let seconds = if hours.is_finite() { (hours * 3600.0).round() as i64 } else { 0 };
    now + Duration::seconds(seconds)
}

/// ETA desde el instante actual
pub fn eta_from_distance(distance_km: f64, avg_speed_kmh: f64) -> DateTime<Utc> {
    eta_from_distance_at(Utc::now(), distance_km, avg_speed_kmh)
}
