//! Secuenciador de paradas
//!
//! Heurística voraz: prioridad descendente y, a igual prioridad, distancia
//! ascendente desde el origen. No es un TSP; la prioridad siempre domina.

use std::cmp::Ordering;

use crate::models::{DeliveryStop, GeoPoint};
use crate::utils::geo_math;

/// Ordenar paradas por prioridad y cercanía al origen (orden estable)
pub fn order_stops(origin: &GeoPoint, stops: &[DeliveryStop]) -> Vec<DeliveryStop> {
    let mut keyed: Vec<(f64, &DeliveryStop)> = stops
        .iter()
        .map(|stop| (geo_math::distance_km(origin, &stop.location), stop))
        .collect();

    keyed.sort_by(|(dist_a, a), (dist_b, b)| {
        b.priority
            .cmp(&a.priority)
            .then_with(|| dist_a.partial_cmp(dist_b).unwrap_or(Ordering::Equal))
    });

    keyed.into_iter().map(|(_, stop)| stop.clone()).collect()
}

/// Lista completa de puntos: origen, paradas ordenadas, destino
pub fn sequence(origin: &GeoPoint, stops: &[DeliveryStop], destination: &GeoPoint) -> Vec<GeoPoint> {
    let mut points = Vec::with_capacity(stops.len() + 2);
    points.push(*origin);
    points.extend(order_stops(origin, stops).iter().map(|stop| stop.location));
    points.push(*destination);
    points
}
