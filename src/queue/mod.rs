//! Cola de ingesta de telemetría
//!
//! FIFO por tenant, duradera y con entrega al-menos-una-vez. El camino HTTP
//! solo encola; el worker de ingesta desencola, procesa y confirma. Una
//! lectura no confirmada vuelve a la cabeza de su cola. Las que fallan de
//! forma permanente pasan a una lista de descarte por tenant.

pub mod memory_queue;
pub mod redis_queue;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::models::TelemetryReading;
use crate::utils::AppError;

pub use memory_queue::MemoryIngestionQueue;
pub use redis_queue::RedisIngestionQueue;

#[derive(Error, Debug)]
pub enum QueueError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<QueueError> for AppError {
    fn from(error: QueueError) -> Self {
        AppError::ServiceUnavailable(format!("Ingestion queue: {}", error))
    }
}

/// Sobre serializado que viaja por la cola
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    id: Uuid,
    tenant_id: String,
    reading: TelemetryReading,
}

/// Lectura entregada por la cola, pendiente de ack/nack
#[derive(Debug, Clone)]
pub struct QueuedReading {
    pub id: Uuid,
    pub tenant_id: String,
    pub reading: TelemetryReading,
    /// Representación exacta en la cola; identifica la entrega
    payload: String,
}

impl QueuedReading {
    fn seal(tenant_id: &str, reading: &TelemetryReading) -> Result<String, QueueError> {
        let envelope = Envelope {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            reading: reading.clone(),
        };
        Ok(serde_json::to_string(&envelope)?)
    }

    fn open(payload: String) -> Result<Self, QueueError> {
        let envelope: Envelope = serde_json::from_str(&payload)?;
        Ok(Self {
            id: envelope.id,
            tenant_id: envelope.tenant_id,
            reading: envelope.reading,
            payload,
        })
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

#[async_trait]
pub trait IngestionQueue: Send + Sync {
    async fn enqueue(&self, tenant_id: &str, reading: &TelemetryReading) -> Result<(), QueueError>;

    /// Encolar varias lecturas de un tenant conservando su orden
    async fn enqueue_batch(&self, tenant_id: &str, readings: &[TelemetryReading]) -> Result<(), QueueError> {
        for reading in readings {
            self.enqueue(tenant_id, reading).await?;
        }
        Ok(())
    }

    /// Tomar hasta `max` lecturas, alternando entre tenants
    async fn dequeue(&self, max: usize) -> Result<Vec<QueuedReading>, QueueError>;

    async fn ack(&self, item: &QueuedReading) -> Result<(), QueueError>;

    /// Devolver lecturas a la cabeza de su cola; `items` en orden de entrega
    async fn nack(&self, items: &[QueuedReading]) -> Result<(), QueueError>;

    /// Sacar una entrega de la cola hacia la lista de descarte del tenant
    async fn dead_letter(&self, item: &QueuedReading) -> Result<(), QueueError>;

    async fn dead_lettered(&self, tenant_id: &str) -> Result<usize, QueueError>;

    /// Recuperar entregas sin confirmar de una ejecución anterior
    async fn requeue_in_flight(&self) -> Result<usize, QueueError>;

    async fn pending(&self, tenant_id: &str) -> Result<usize, QueueError>;
}
