//! Optimizador de rutas
//!
//! Orquesta cache → distancia base → secuenciador → predictor → waypoints →
//! puntuación → alternativas → persistencia → cache. Siempre devuelve una
//! ruta de mejor esfuerzo para solicitudes válidas.
//!
//! Cada clave (route_id, tenant_id) tiene como máximo un cálculo en vuelo;
//! una segunda llamada concurrente espera y luego lee la cache. La cache solo
//! se escribe cuando el cálculo completo termina.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::Mutex;

use super::prediction_service::DurationFuelPredictor;
use super::route_sequencer;
use crate::cache::RouteCache;
use crate::metrics::Metrics;
use crate::models::{
    AlternativeRoute, GeoPoint, OptimizedRoute, RouteOptimizationRequest, Waypoint, WaypointKind,
};
use crate::repositories::FleetRepository;
use crate::utils::errors::{AppError, AppResult};
use crate::utils::geo_math;
use crate::utils::validation::validate_route_request;

/// Minutos entre llegadas consecutivas
const LEG_INTERVAL_MIN: i64 = 30;
/// Tiempo de servicio fijo por parada
const SERVICE_TIME_MIN: i64 = 15;
/// Distancia a la que la eficiencia llega a cero
const EFFICIENCY_HORIZON_KM: f64 = 1000.0;

/// (etiqueta, factor de distancia, factor de duración)
const ALTERNATIVES: [(&str, f64, f64); 2] = [("fastest", 1.08, 0.92), ("shortest", 0.95, 1.10)];

type FlightMap = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// Turno de cálculo para una clave; limpia la entrada al soltarse
struct Flight<'a> {
    flights: &'a FlightMap,
    key: String,
    gate: Arc<Mutex<()>>,
}

impl Drop for Flight<'_> {
    fn drop(&mut self) {
        let mut flights = self.flights.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let unused = flights
            .get(&self.key)
            .map(|gate| Arc::ptr_eq(gate, &self.gate) && Arc::strong_count(&self.gate) <= 2)
            .unwrap_or(false);
        if unused {
            flights.remove(&self.key);
        }
    }
}

/// Puntuación en [0, 100]; la eficiencia negativa de rutas largas se trunca a 0
pub fn optimization_score(total_distance_km: f64, confidence: f64) -> f64 {
    let efficiency = (1.0 - total_distance_km / EFFICIENCY_HORIZON_KM).clamp(0.0, 1.0);
    (100.0 * (0.6 * efficiency + 0.4 * confidence.clamp(0.0, 1.0))).clamp(0.0, 100.0)
}

pub struct RouteOptimizer {
    cache: RouteCache,
    predictor: DurationFuelPredictor,
    repository: Arc<dyn FleetRepository>,
    metrics: Metrics,
    fuel_price_per_liter: f64,
    flights: FlightMap,
}

impl RouteOptimizer {
    pub fn new(
        cache: RouteCache,
        predictor: DurationFuelPredictor,
        repository: Arc<dyn FleetRepository>,
        metrics: Metrics,
        fuel_price_per_liter: f64,
    ) -> Self {
        Self {
            cache,
            predictor,
            repository,
            metrics,
            fuel_price_per_liter,
            flights: StdMutex::new(HashMap::new()),
        }
    }

    /// Hay un modelo entrenado detrás del predictor
    pub fn has_model(&self) -> bool {
        self.predictor.has_model()
    }

    fn board(&self, key: &str) -> Flight<'_> {
        let mut flights = self.flights.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let gate = flights.entry(key.to_string()).or_default().clone();
        Flight {
            flights: &self.flights,
            key: key.to_string(),
            gate,
        }
    }

    pub async fn optimize(&self, tenant_id: &str, request: &RouteOptimizationRequest) -> AppResult<OptimizedRoute> {
        validate_route_request(request)?;

        if let Some(cached) = self.cache.get(&request.route_id, tenant_id).await {
            self.metrics.optimization_cache_hits.inc();
            log::debug!("📥 Ruta {} servida desde cache", request.route_id);
            return Ok(cached);
        }

        let key = RouteCache::route_key(&request.route_id, tenant_id);
        let flight = self.board(&key);
        let _turn = flight.gate.lock().await;

        // Otro cálculo pudo terminar mientras esperábamos
        if let Some(cached) = self.cache.get(&request.route_id, tenant_id).await {
            self.metrics.optimization_cache_hits.inc();
            return Ok(cached);
        }
        self.metrics.optimization_cache_misses.inc();

        let route = self.compute(tenant_id, request, Utc::now());

        if let Err(e) = self.repository.insert_optimized_route(&route).await {
            log::warn!("⚠️ Ruta {} no persistida: {}", route.route_id, e);
        }
        if let Err(e) = self.cache.put(&route).await {
            log::warn!("⚠️ Ruta {} no guardada en cache: {}", route.route_id, e);
        }

        log::info!(
            "🗺️ Ruta {} optimizada: {} waypoints, {:.2} km, puntuación {:.1}",
            route.route_id,
            route.waypoints.len(),
            route.total_distance_km,
            route.optimization_score
        );
        Ok(route)
    }

    pub async fn invalidate(&self, tenant_id: &str, route_id: &str) -> AppResult<()> {
        self.cache
            .invalidate(route_id, tenant_id)
            .await
            .map_err(|e| AppError::ServiceUnavailable(format!("Route cache: {}", e)))
    }

    /// Calcular la ruta sin efectos secundarios
    pub fn compute(&self, tenant_id: &str, request: &RouteOptimizationRequest, now: DateTime<Utc>) -> OptimizedRoute {
        let vehicle_type = request.vehicle_type.unwrap_or_default();
        let departure = request.departure_time.unwrap_or(now);

        let mut base_points = Vec::with_capacity(request.stops.len() + 2);
        base_points.push(request.origin);
        base_points.extend(request.stops.iter().map(|s| s.location));
        base_points.push(request.destination);
        let base_distance_km = geo_math::path_distance_km(&base_points);

        let ordered = route_sequencer::order_stops(&request.origin, &request.stops);
        let mut points: Vec<GeoPoint> = Vec::with_capacity(ordered.len() + 2);
        points.push(request.origin);
        points.extend(ordered.iter().map(|s| s.location));
        points.push(request.destination);
        let total_distance_km = geo_math::path_distance_km(&points);

        let features = DurationFuelPredictor::features(
            total_distance_km,
            ordered.len(),
            vehicle_type,
            departure,
            request.traffic_level,
            request.weather_severity,
        );
        let prediction = self.predictor.predict(&features);

        let last = points.len() - 1;
        let waypoints: Vec<Waypoint> = points
            .iter()
            .enumerate()
            .map(|(index, location)| {
                let arrival_time = departure + Duration::minutes(index as i64 * LEG_INTERVAL_MIN);
                let (kind, stop) = match index {
                    0 => (WaypointKind::Origin, None),
                    i if i == last => (WaypointKind::Destination, None),
                    i => (WaypointKind::Stop, ordered.get(i - 1)),
                };
                Waypoint {
                    sequence_number: index as u32 + 1,
                    kind,
                    stop_id: stop.and_then(|s| s.id.clone()),
                    priority: stop.map(|s| s.priority),
                    location: *location,
                    arrival_time,
                    departure_time: arrival_time + Duration::minutes(SERVICE_TIME_MIN),
                }
            })
            .collect();

        let alternative_routes = ALTERNATIVES
            .iter()
            .map(|(label, distance_factor, duration_factor)| {
                let distance = total_distance_km * distance_factor;
                AlternativeRoute {
                    label: label.to_string(),
                    total_distance_km: distance,
                    estimated_duration_min: prediction.duration_min * duration_factor,
                    optimization_score: optimization_score(distance, prediction.confidence),
                }
            })
            .collect();

        let mut constraint_warnings = Vec::new();
        if let Some(max) = request.constraints.max_duration_min {
            if prediction.duration_min > max {
                constraint_warnings.push(format!(
                    "Estimated duration {:.0} min exceeds limit of {:.0} min",
                    prediction.duration_min, max
                ));
            }
        }
        if let Some(max) = request.constraints.max_distance_km {
            if total_distance_km > max {
                constraint_warnings.push(format!(
                    "Total distance {:.1} km exceeds limit of {:.1} km",
                    total_distance_km, max
                ));
            }
        }
        for (waypoint, stop) in waypoints.iter().skip(1).zip(ordered.iter()) {
            if let Some(window) = &stop.time_window {
                if !window.contains(waypoint.arrival_time) {
                    constraint_warnings.push(format!(
                        "Stop {} arrives at {} outside its time window",
                        waypoint.sequence_number,
                        waypoint.arrival_time.to_rfc3339()
                    ));
                }
            }
        }

        OptimizedRoute {
            route_id: request.route_id.clone(),
            tenant_id: tenant_id.to_string(),
            vehicle_type,
            waypoints,
            total_distance_km,
            base_distance_km,
            estimated_duration_min: prediction.duration_min,
            estimated_fuel_cost: prediction.fuel_liters * self.fuel_price_per_liter,
            optimization_score: optimization_score(total_distance_km, prediction.confidence),
            alternative_routes,
            prediction,
            constraint_warnings,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::models::{DeliveryStop, PredictionSource, RouteConstraints, TimeWindow, VehicleType};
    use crate::repositories::InMemoryFleetRepository;
    use chrono::TimeZone;

    fn optimizer() -> RouteOptimizer {
        RouteOptimizer::new(
            RouteCache::new(Arc::new(MemoryCache::new()), 3600),
            DurationFuelPredictor::default(),
            Arc::new(InMemoryFleetRepository::new()),
            Metrics::new().unwrap(),
            2.0,
        )
    }

    fn request(stops: Vec<DeliveryStop>) -> RouteOptimizationRequest {
        RouteOptimizationRequest {
            route_id: "R-42".to_string(),
            origin: GeoPoint::new(45.0, 5.0),
            destination: GeoPoint::new(45.1, 5.1),
            stops,
            vehicle_type: None,
            departure_time: Some(Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()),
            constraints: RouteConstraints::default(),
            traffic_level: None,
            weather_severity: None,
        }
    }

    fn stop(id: &str, latitude: f64, priority: u32) -> DeliveryStop {
        DeliveryStop {
            id: Some(id.to_string()),
            location: GeoPoint::new(latitude, 5.0),
            priority,
            time_window: None,
        }
    }

    #[test]
    fn test_score_is_clamped_for_long_routes() {
        assert_eq!(optimization_score(5000.0, 0.5), 20.0);
        assert_eq!(optimization_score(0.0, 1.0), 100.0);
        assert!((optimization_score(500.0, 0.5) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_stops_give_direct_route() {
        let route = optimizer().compute("acme", &request(vec![]), Utc::now());
        assert_eq!(route.waypoints.len(), 2);
        assert_eq!(route.waypoints[0].kind, WaypointKind::Origin);
        assert_eq!(route.waypoints[1].kind, WaypointKind::Destination);
        assert_eq!(route.intermediate_stops().count(), 0);
        assert_eq!(route.vehicle_type, VehicleType::Generic);
        assert_eq!(route.total_distance_km, route.base_distance_km);
    }

    #[test]
    fn test_waypoint_schedule_and_fallback_prediction() {
        let req = request(vec![stop("A", 45.01, 1), stop("B", 45.5, 5)]);
        let departure = req.departure_time.unwrap();
        let route = optimizer().compute("acme", &req, Utc::now());

        let sequence: Vec<u32> = route.waypoints.iter().map(|w| w.sequence_number).collect();
        assert_eq!(sequence, vec![1, 2, 3, 4]);
        for (index, waypoint) in route.waypoints.iter().enumerate() {
            assert_eq!(waypoint.arrival_time, departure + Duration::minutes(30 * index as i64));
            assert_eq!(waypoint.departure_time, waypoint.arrival_time + Duration::minutes(15));
        }

        let stop_ids: Vec<&str> = route.intermediate_stops().filter_map(|w| w.stop_id.as_deref()).collect();
        assert_eq!(stop_ids, vec!["B", "A"]);

        assert_eq!(route.prediction.source, PredictionSource::Fallback);
        assert_eq!(route.estimated_duration_min, 120.0);
        assert_eq!(route.estimated_fuel_cost, 50.0);
        assert_eq!(route.alternative_routes.len(), 2);
        assert!(route.total_distance_km > route.base_distance_km);
    }

    #[test]
    fn test_constraint_violations_are_warnings() {
        let mut req = request(vec![DeliveryStop {
            time_window: Some(TimeWindow {
                start: Utc.with_ymd_and_hms(2024, 5, 6, 14, 0, 0).unwrap(),
                end: Utc.with_ymd_and_hms(2024, 5, 6, 15, 0, 0).unwrap(),
            }),
            ..stop("A", 45.05, 1)
        }]);
        req.constraints.max_duration_min = Some(60.0);
        req.constraints.max_distance_km = Some(1.0);

        let route = optimizer().compute("acme", &req, Utc::now());
        assert_eq!(route.constraint_warnings.len(), 3);
        assert_eq!(route.waypoints.len(), 3);
    }

    #[tokio::test]
    async fn test_invalid_request_is_rejected() {
        let mut req = request(vec![]);
        req.origin = GeoPoint::new(95.0, 5.0);
        assert!(matches!(
            optimizer().optimize("acme", &req).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let optimizer = optimizer();
        let req = request(vec![stop("A", 45.05, 1)]);

        let first = optimizer.optimize("acme", &req).await.unwrap();
        let cached = optimizer.optimize("acme", &req).await.unwrap();
        assert_eq!(first, cached);

        optimizer.invalidate("acme", "R-42").await.unwrap();
        let fresh = optimizer.optimize("acme", &req).await.unwrap();
        assert_ne!(fresh.created_at, first.created_at);
        assert!(optimizer.flights.lock().unwrap().is_empty());
    }
}
