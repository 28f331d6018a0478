//! Shared application state
//!
//! Este módulo define el estado compartido de la aplicación que se pasa
//! a través del router de Axum. Los colaboradores externos se inyectan
//! como objetos de trait para poder sustituirlos en pruebas.

use std::sync::Arc;
use std::time::Duration;

use crate::cache::{CacheStore, GeofenceCache, MemoryCache, RedisClient, RouteCache};
use crate::config::environment::EnvironmentConfig;
use crate::metrics::Metrics;
use crate::queue::{IngestionQueue, MemoryIngestionQueue};
use crate::repositories::{FleetRepository, InMemoryFleetRepository};
use crate::services::{
    AlertEvaluator, BroadcastEventPublisher, DurationFuelPredictor, EventPublisher, IngestionWorker,
    RegressionModel, RouteOptimizer, TelemetryProcessor, TelemetryService, TrackingStore,
};

/// Colaboradores de infraestructura del servicio
#[derive(Clone)]
pub struct Collaborators {
    pub repository: Arc<dyn FleetRepository>,
    pub queue: Arc<dyn IngestionQueue>,
    pub cache: Arc<dyn CacheStore>,
    pub publisher: Arc<dyn EventPublisher>,
    pub model: Option<Arc<dyn RegressionModel>>,
    pub redis: Option<RedisClient>,
}

impl Collaborators {
    /// Todo en proceso: pruebas y ejecución local sin PostgreSQL ni Redis
    pub fn in_memory() -> Self {
        Self {
            repository: Arc::new(InMemoryFleetRepository::new()),
            queue: Arc::new(MemoryIngestionQueue::new()),
            cache: Arc::new(MemoryCache::new()),
            publisher: Arc::new(BroadcastEventPublisher::new(1024)),
            model: None,
            redis: None,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub config: EnvironmentConfig,
    pub telemetry: TelemetryService,
    pub processor: Arc<TelemetryProcessor>,
    pub optimizer: Arc<RouteOptimizer>,
    pub repository: Arc<dyn FleetRepository>,
    pub queue: Arc<dyn IngestionQueue>,
    pub metrics: Metrics,
    pub redis: Option<RedisClient>,
}

impl AppState {
    pub fn new(config: EnvironmentConfig, collaborators: Collaborators, metrics: Metrics) -> Self {
        let Collaborators {
            repository,
            queue,
            cache,
            publisher,
            model,
            redis,
        } = collaborators;

        let processor = TelemetryProcessor::new(
            TrackingStore::new(repository.clone()),
            AlertEvaluator::new(config.alert_thresholds),
            GeofenceCache::new(repository.clone(), Duration::from_secs(config.geofence_refresh_secs)),
            repository.clone(),
            publisher,
            metrics.clone(),
        );
        let optimizer = RouteOptimizer::new(
            RouteCache::new(cache, config.route_cache_ttl_secs),
            DurationFuelPredictor::new(model),
            repository.clone(),
            metrics.clone(),
            config.fuel_price_per_liter,
        );

        Self {
            telemetry: TelemetryService::new(queue.clone(), metrics.clone()),
            processor: Arc::new(processor),
            optimizer: Arc::new(optimizer),
            repository,
            queue,
            metrics,
            redis,
            config,
        }
    }

    pub fn in_memory(config: EnvironmentConfig) -> prometheus::Result<Self> {
        Ok(Self::new(config, Collaborators::in_memory(), Metrics::new()?))
    }

    /// Worker de ingesta que consume la cola de este estado
    pub fn ingestion_worker(&self) -> IngestionWorker {
        IngestionWorker::new(
            self.queue.clone(),
            self.processor.clone(),
            self.metrics.clone(),
            self.config.ingestion_batch_size,
            self.config.ingestion_shards,
            Duration::from_millis(self.config.ingestion_idle_ms),
        )
    }
}
