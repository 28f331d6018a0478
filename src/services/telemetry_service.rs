//! Servicio de telemetría
//!
//! `TelemetryService` es la entrada: valida y encola, nunca procesa.
//! `TelemetryProcessor` aplica una lectura desencolada al estado del vehículo:
//! geocercas → alertas → viaje → persistencia → commit → eventos.

use std::sync::Arc;

use super::alert_evaluator::AlertEvaluator;
use super::event_publisher::{publish_all, DomainEvent, EventPublisher};
use super::tracking_store::TrackingStore;
use super::trip_tracker::TripTracker;
use crate::cache::GeofenceCache;
use crate::metrics::Metrics;
use crate::models::{ProcessingOutcome, TelemetryReading, Trip, TripChange};
use crate::queue::IngestionQueue;
use crate::repositories::FleetRepository;
use crate::utils::errors::{bad_request_error, AppResult};
use crate::utils::validation::validate_reading;

#[derive(Clone)]
pub struct TelemetryService {
    queue: Arc<dyn IngestionQueue>,
    metrics: Metrics,
}

impl TelemetryService {
    pub fn new(queue: Arc<dyn IngestionQueue>, metrics: Metrics) -> Self {
        Self { queue, metrics }
    }

    /// Validar y encolar una lectura. Las lecturas inválidas nunca se encolan.
    pub async fn record(&self, tenant_id: &str, reading: &TelemetryReading) -> AppResult<()> {
        if let Err(e) = validate_reading(reading) {
            self.metrics.readings_rejected.inc();
            return Err(e.into());
        }

        self.queue.enqueue(tenant_id, reading).await?;
        self.metrics.readings_accepted.inc();
        log::debug!("📡 Lectura encolada: {}/{} @ {}", tenant_id, reading.vehicle_id, reading.timestamp);
        Ok(())
    }

    /// Validar todo el lote antes de encolar; un solo error rechaza el lote
    pub async fn record_batch(&self, tenant_id: &str, readings: &[TelemetryReading]) -> AppResult<usize> {
        if readings.is_empty() {
            return Err(bad_request_error("Telemetry batch is empty"));
        }

        for (index, reading) in readings.iter().enumerate() {
            if let Err(e) = validate_reading(reading) {
                log::warn!("⚠️ Lote rechazado: lectura {} inválida", index);
                self.metrics.readings_rejected.inc_by(readings.len() as u64);
                return Err(e.into());
            }
        }

        self.queue.enqueue_batch(tenant_id, readings).await?;
        self.metrics.readings_accepted.inc_by(readings.len() as u64);
        log::info!("📡 Lote de {} lecturas encolado para tenant {}", readings.len(), tenant_id);
        Ok(readings.len())
    }
}

pub struct TelemetryProcessor {
    store: TrackingStore,
    tracker: TripTracker,
    evaluator: AlertEvaluator,
    geofences: GeofenceCache,
    repository: Arc<dyn FleetRepository>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Metrics,
}

impl TelemetryProcessor {
    pub fn new(
        store: TrackingStore,
        evaluator: AlertEvaluator,
        geofences: GeofenceCache,
        repository: Arc<dyn FleetRepository>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            tracker: TripTracker::new(),
            evaluator,
            geofences,
            repository,
            publisher,
            metrics,
        }
    }

    pub fn store(&self) -> &TrackingStore {
        &self.store
    }

    pub async fn active_trip(&self, tenant_id: &str, vehicle_id: &str) -> AppResult<Option<Trip>> {
        self.store.active_trip(tenant_id, vehicle_id).await
    }

    /// Aplicar una lectura desencolada.
    ///
    /// Se calcula sobre una copia del estado; solo tras persistir se confirma.
    /// Un error deja el estado intacto y la lectura debe reentregarse.
    pub async fn process(&self, tenant_id: &str, reading: &TelemetryReading) -> AppResult<ProcessingOutcome> {
        let mut state = self.store.lock(tenant_id, &reading.vehicle_id).await?;

        if state.is_stale(reading) {
            log::warn!(
                "⚠️ Lectura obsoleta ignorada para {}/{}: {} <= {:?}",
                tenant_id,
                reading.vehicle_id,
                reading.timestamp,
                state.last_timestamp
            );
            self.metrics.readings_stale.inc();
            return Ok(ProcessingOutcome::Stale);
        }

        // Tras el lock: una invalidación previa ya es visible aquí
        let fences = self.geofences.get(tenant_id).await;
        let mut next = state.clone();
        let alerts = self.evaluator.evaluate(tenant_id, reading, &fences, &mut next.geofences);
        let change = self.tracker.apply(tenant_id, &mut next, reading);

        self.repository
            .persist_reading(tenant_id, reading, &alerts, change.as_ref())
            .await?;

        *state = next;

        let mut events: Vec<DomainEvent> = alerts.iter().cloned().map(DomainEvent::AlertCreated).collect();
        for alert in &alerts {
            self.metrics.alerts_emitted.with_label_values(&[alert.kind.as_str()]).inc();
            log::info!("🚨 Alerta {} ({}) para {}", alert.kind.as_str(), alert.severity.as_str(), alert.vehicle_id);
        }
        match &change {
            Some(TripChange::Started(trip)) => {
                self.metrics.trips_opened.inc();
                log::info!("🚗 Viaje {} iniciado para {}", trip.trip_id, trip.vehicle_id);
                events.push(DomainEvent::TripStarted(trip.clone()));
            }
            Some(TripChange::Closed(trip)) => {
                self.metrics.trips_closed.inc();
                log::info!(
                    "🏁 Viaje {} cerrado para {} ({:.2} km)",
                    trip.trip_id,
                    trip.vehicle_id,
                    trip.total_distance_km
                );
                events.push(DomainEvent::TripClosed(trip.clone()));
            }
            Some(TripChange::Updated(_)) | None => {}
        }

        // Bajo el lock del vehículo para conservar el orden de eventos
        publish_all(self.publisher.as_ref(), &events).await;
        drop(state);

        self.metrics.readings_processed.inc();
        Ok(ProcessingOutcome::Applied {
            alerts: alerts.len(),
            trip_changed: change.is_some(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::MemoryIngestionQueue;
    use crate::utils::AppError;
    use chrono::Utc;

    fn reading(latitude: f64) -> TelemetryReading {
        TelemetryReading {
            vehicle_id: "VAN-1".to_string(),
            device_id: "DEV-1".to_string(),
            latitude,
            longitude: 2.35,
            speed: 30.0,
            heading: None,
            accuracy: None,
            satellite_count: None,
            odometer: None,
            ignition_on: true,
            battery_percent: None,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_invalid_reading_is_never_enqueued() {
        let queue = MemoryIngestionQueue::new();
        let service = TelemetryService::new(Arc::new(queue.clone()), Metrics::new().unwrap());

        for latitude in [91.0, -90.5, f64::NAN] {
            let err = service.record("acme", &reading(latitude)).await.unwrap_err();
            assert!(matches!(err, AppError::Validation(_)));
        }
        assert_eq!(queue.pending("acme").await.unwrap(), 0);

        service.record("acme", &reading(48.85)).await.unwrap();
        assert_eq!(queue.pending("acme").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_is_all_or_nothing() {
        let queue = MemoryIngestionQueue::new();
        let service = TelemetryService::new(Arc::new(queue.clone()), Metrics::new().unwrap());

        let batch = vec![reading(48.0), reading(120.0), reading(49.0)];
        assert!(service.record_batch("acme", &batch).await.is_err());
        assert_eq!(queue.pending("acme").await.unwrap(), 0);

        assert!(matches!(
            service.record_batch("acme", &[]).await,
            Err(AppError::BadRequest(_))
        ));

        let accepted = service
            .record_batch("acme", &[reading(48.0), reading(49.0)])
            .await
            .unwrap();
        assert_eq!(accepted, 2);
        assert_eq!(queue.pending("acme").await.unwrap(), 2);
    }
}
