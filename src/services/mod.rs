//! Services module
//!
//! Este módulo contiene la lógica de negocio del rastreo de flota:
//! evaluación de alertas, máquina de viajes, ingesta de telemetría,
//! secuenciación, predicción y optimización de rutas.

pub mod alert_evaluator;
pub mod event_publisher;
pub mod ingestion_worker;
pub mod model_training;
pub mod prediction_service;
pub mod route_optimizer;
pub mod route_sequencer;
pub mod telemetry_service;
pub mod tracking_store;
pub mod trip_tracker;

pub use alert_evaluator::{AlertEvaluator, GeofenceContainment};
pub use event_publisher::{BroadcastEventPublisher, DomainEvent, EventPublisher, RedisEventPublisher};
pub use ingestion_worker::{BatchReport, IngestionWorker};
pub use prediction_service::{
    DurationFuelPredictor, LinearRegressionModel, ModelStore, PredictionError, RegressionModel,
};
pub use route_optimizer::RouteOptimizer;
pub use telemetry_service::{TelemetryProcessor, TelemetryService};
pub use tracking_store::{TrackingStore, VehicleState};
pub use trip_tracker::{TripState, TripTracker};
