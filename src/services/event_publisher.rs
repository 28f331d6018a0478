//! Publicación de eventos de dominio
//!
//! Cada alerta creada y cada apertura/cierre de viaje produce un evento para
//! difusión aguas abajo. Este servicio no gestiona suscriptores; los fallos
//! de publicación se registran y nunca interrumpen el procesamiento.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::cache::RedisClient;
use crate::models::{Alert, Trip};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "payload")]
pub enum DomainEvent {
    #[serde(rename = "alert.created")]
    AlertCreated(Alert),
    #[serde(rename = "trip.started")]
    TripStarted(Trip),
    #[serde(rename = "trip.closed")]
    TripClosed(Trip),
}

impl DomainEvent {
    pub fn name(&self) -> &'static str {
        match self {
            DomainEvent::AlertCreated(_) => "alert.created",
            DomainEvent::TripStarted(_) => "trip.started",
            DomainEvent::TripClosed(_) => "trip.closed",
        }
    }

    pub fn tenant_id(&self) -> &str {
        match self {
            DomainEvent::AlertCreated(alert) => &alert.tenant_id,
            DomainEvent::TripStarted(trip) | DomainEvent::TripClosed(trip) => &trip.tenant_id,
        }
    }
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &DomainEvent) -> Result<()>;
}

/// Publicar una serie de eventos; los errores solo se registran
pub async fn publish_all(publisher: &dyn EventPublisher, events: &[DomainEvent]) {
    for event in events {
        if let Err(e) = publisher.publish(event).await {
            log::warn!("⚠️ No se pudo publicar {}: {}", event.name(), e);
        }
    }
}

/// Difusión en proceso sobre un canal `broadcast` de tokio
#[derive(Clone)]
pub struct BroadcastEventPublisher {
    sender: broadcast::Sender<DomainEvent>,
}

impl BroadcastEventPublisher {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DomainEvent> {
        self.sender.subscribe()
    }
}

#[async_trait]
impl EventPublisher for BroadcastEventPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        match self.sender.send(event.clone()) {
            Ok(receivers) => log::debug!("📣 {} entregado a {} suscriptores", event.name(), receivers),
            // Sin suscriptores no es un fallo
            Err(_) => log::debug!("📣 {} sin suscriptores", event.name()),
        }
        Ok(())
    }
}

/// Publicación vía Redis PUBLISH en un canal por tenant
#[derive(Clone)]
pub struct RedisEventPublisher {
    redis: RedisClient,
}

impl RedisEventPublisher {
    pub fn new(redis: RedisClient) -> Self {
        Self { redis }
    }

    pub fn channel(tenant_id: &str) -> String {
        format!("fleet_tracker:events:{}", tenant_id)
    }
}

#[async_trait]
impl EventPublisher for RedisEventPublisher {
    async fn publish(&self, event: &DomainEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        self.redis
            .publish(&Self::channel(event.tenant_id()), &payload)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AlertKind, AlertSeverity, GeoPoint};
    use chrono::Utc;

    fn trip() -> Trip {
        Trip::open("acme", "VAN-1", Utc::now(), GeoPoint::new(1.0, 2.0), 0.0)
    }

    #[test]
    fn test_event_wire_format() {
        let value = serde_json::to_value(DomainEvent::TripStarted(trip())).unwrap();
        assert_eq!(value["event"], "trip.started");
        assert_eq!(value["payload"]["vehicle_id"], "VAN-1");

        let alert = Alert::new(
            "acme",
            "VAN-1",
            AlertKind::Speeding,
            AlertSeverity::High,
            "fast".to_string(),
            GeoPoint::new(1.0, 2.0),
            Utc::now(),
        );
        let event = DomainEvent::AlertCreated(alert);
        assert_eq!(event.name(), "alert.created");
        assert_eq!(event.tenant_id(), "acme");
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["event"], "alert.created");
    }

    #[tokio::test]
    async fn test_broadcast_delivers_to_subscribers() {
        let publisher = BroadcastEventPublisher::new(16);
        let mut receiver = publisher.subscribe();

        let event = DomainEvent::TripClosed(trip());
        publisher.publish(&event).await.unwrap();
        assert_eq!(receiver.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_broadcast_without_subscribers_is_ok() {
        let publisher = BroadcastEventPublisher::new(4);
        assert!(publisher.publish(&DomainEvent::TripStarted(trip())).await.is_ok());
    }
}
