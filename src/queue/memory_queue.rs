use async_trait::async_trait;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

use super::{IngestionQueue, QueueError, QueuedReading};
use crate::models::TelemetryReading;

#[derive(Default)]
struct QueueState {
    queues: BTreeMap<String, VecDeque<String>>,
    in_flight: BTreeMap<String, Vec<String>>,
    dead: BTreeMap<String, Vec<String>>,
}

/// Cola de ingesta en proceso con la misma semántica que la de Redis
#[derive(Clone, Default)]
pub struct MemoryIngestionQueue {
    state: Arc<Mutex<QueueState>>,
}

impl MemoryIngestionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.values().map(Vec::len).sum()
    }
}

fn remove_in_flight(state: &mut QueueState, item: &QueuedReading) {
    if let Some(in_flight) = state.in_flight.get_mut(&item.tenant_id) {
        if let Some(pos) = in_flight.iter().position(|p| p == item.payload()) {
            in_flight.remove(pos);
        }
    }
}

#[async_trait]
impl IngestionQueue for MemoryIngestionQueue {
    async fn enqueue(&self, tenant_id: &str, reading: &TelemetryReading) -> Result<(), QueueError> {
        let payload = QueuedReading::seal(tenant_id, reading)?;
        let mut state = self.state.lock().await;
        state.queues.entry(tenant_id.to_string()).or_default().push_back(payload);
        Ok(())
    }

    async fn dequeue(&self, max: usize) -> Result<Vec<QueuedReading>, QueueError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let mut batch = Vec::new();

        loop {
            let mut moved = false;
            for (tenant_id, queue) in state.queues.iter_mut() {
                if batch.len() >= max {
                    break;
                }
                if let Some(payload) = queue.pop_front() {
                    state
                        .in_flight
                        .entry(tenant_id.clone())
                        .or_default()
                        .push(payload.clone());
                    batch.push(QueuedReading::open(payload)?);
                    moved = true;
                }
            }
            if !moved || batch.len() >= max {
                break;
            }
        }

        Ok(batch)
    }

    async fn ack(&self, item: &QueuedReading) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        remove_in_flight(&mut state, item);
        Ok(())
    }

    async fn nack(&self, items: &[QueuedReading]) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        for item in items.iter().rev() {
            remove_in_flight(&mut state, item);
            state
                .queues
                .entry(item.tenant_id.clone())
                .or_default()
                .push_front(item.payload().to_string());
        }
        Ok(())
    }

    async fn dead_letter(&self, item: &QueuedReading) -> Result<(), QueueError> {
        let mut state = self.state.lock().await;
        remove_in_flight(&mut state, item);
        state
            .dead
            .entry(item.tenant_id.clone())
            .or_default()
            .push(item.payload().to_string());
        Ok(())
    }

    async fn dead_lettered(&self, tenant_id: &str) -> Result<usize, QueueError> {
        let state = self.state.lock().await;
        Ok(state.dead.get(tenant_id).map(Vec::len).unwrap_or(0))
    }

    async fn requeue_in_flight(&self) -> Result<usize, QueueError> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        let mut restored = 0;

        for (tenant_id, in_flight) in std::mem::take(&mut state.in_flight) {
            let queue = state.queues.entry(tenant_id).or_default();
            restored += in_flight.len();
            for payload in in_flight.into_iter().rev() {
                queue.push_front(payload);
            }
        }
        Ok(restored)
    }

    async fn pending(&self, tenant_id: &str) -> Result<usize, QueueError> {
        let state = self.state.lock().await;
        Ok(state.queues.get(tenant_id).map(VecDeque::len).unwrap_or(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn reading(vehicle_id: &str, second: i64) -> TelemetryReading {
        TelemetryReading {
            vehicle_id: vehicle_id.to_string(),
            device_id: "DEV".to_string(),
            latitude: 10.0,
            longitude: 10.0,
            speed: 10.0,
            heading: None,
            accuracy: None,
            satellite_count: None,
            odometer: None,
            ignition_on: true,
            battery_percent: None,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::seconds(second),
        }
    }

    fn seconds(items: &[QueuedReading]) -> Vec<i64> {
        items.iter().map(|i| i.reading.timestamp.timestamp() % 60).collect()
    }

    #[tokio::test]
    async fn test_fifo_per_tenant_and_ack() {
        let queue = MemoryIngestionQueue::new();
        for s in 0..3 {
            queue.enqueue("acme", &reading("V1", s)).await.unwrap();
        }

        let batch = queue.dequeue(10).await.unwrap();
        assert_eq!(seconds(&batch), vec![0, 1, 2]);
        assert_eq!(queue.in_flight().await, 3);

        for item in &batch {
            queue.ack(item).await.unwrap();
        }
        assert_eq!(queue.in_flight().await, 0);
        assert_eq!(queue.pending("acme").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_nack_returns_to_head_in_order() {
        let queue = MemoryIngestionQueue::new();
        for s in 0..5 {
            queue.enqueue("acme", &reading("V1", s)).await.unwrap();
        }

        let batch = queue.dequeue(3).await.unwrap();
        queue.ack(&batch[0]).await.unwrap();
        queue.nack(&batch[1..]).await.unwrap();

        let again = queue.dequeue(10).await.unwrap();
        assert_eq!(seconds(&again), vec![1, 2, 3, 4]);
    }

    #[tokio::test]
    async fn test_dequeue_alternates_tenants() {
        let queue = MemoryIngestionQueue::new();
        for s in 0..3 {
            queue.enqueue("acme", &reading("A", s)).await.unwrap();
            queue.enqueue("globex", &reading("G", s)).await.unwrap();
        }

        let batch = queue.dequeue(4).await.unwrap();
        let tenants: Vec<&str> = batch.iter().map(|i| i.tenant_id.as_str()).collect();
        assert_eq!(tenants, vec!["acme", "globex", "acme", "globex"]);
    }

    #[tokio::test]
    async fn test_requeue_in_flight_restores_order() {
        let queue = MemoryIngestionQueue::new();
        for s in 0..4 {
            queue.enqueue("acme", &reading("V1", s)).await.unwrap();
        }

        let _lost = queue.dequeue(2).await.unwrap();
        assert_eq!(queue.requeue_in_flight().await.unwrap(), 2);

        let batch = queue.dequeue(10).await.unwrap();
        assert_eq!(seconds(&batch), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn test_dead_letter_leaves_queue_and_survives_requeue() {
        let queue = MemoryIngestionQueue::new();
        for s in 0..3 {
            queue.enqueue("acme", &reading("V1", s)).await.unwrap();
        }

        let batch = queue.dequeue(2).await.unwrap();
        queue.dead_letter(&batch[0]).await.unwrap();
        assert_eq!(queue.dead_lettered("acme").await.unwrap(), 1);
        assert_eq!(queue.dead_lettered("globex").await.unwrap(), 0);
        assert_eq!(queue.in_flight().await, 1);

        assert_eq!(queue.requeue_in_flight().await.unwrap(), 1);
        let again = queue.dequeue(10).await.unwrap();
        assert_eq!(seconds(&again), vec![1, 2]);
    }
}
