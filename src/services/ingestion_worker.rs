//! Worker de ingesta
//!
//! Un único consumidor lógico. Cada lote se reparte en `shard_count`
//! particiones por hash de (tenant, vehículo); las particiones corren en
//! paralelo y cada una procesa en orden. Si una lectura falla, las lecturas
//! posteriores del mismo vehículo en el lote se difieren y todas vuelven a
//! la cola en su orden original. Solo los fallos transitorios se reintentan;
//! el resto pasa a la lista de descarte y el vehículo sigue avanzando.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::telemetry_service::TelemetryProcessor;
use crate::metrics::Metrics;
use crate::models::ProcessingOutcome;
use crate::queue::{IngestionQueue, QueueError, QueuedReading};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub dequeued: usize,
    pub processed: usize,
    pub stale: usize,
    pub failed: usize,
    pub deferred: usize,
    pub dead_lettered: usize,
}

enum ItemResult {
    Done(ProcessingOutcome),
    Failed,
    Deferred,
    DeadLettered,
}

pub struct IngestionWorker {
    queue: Arc<dyn IngestionQueue>,
    processor: Arc<TelemetryProcessor>,
    metrics: Metrics,
    batch_size: usize,
    shard_count: usize,
    idle_delay: Duration,
}

pub fn shard_for(tenant_id: &str, vehicle_id: &str, shard_count: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    tenant_id.hash(&mut hasher);
    vehicle_id.hash(&mut hasher);
    (hasher.finish() % shard_count.max(1) as u64) as usize
}

impl IngestionWorker {
    pub fn new(
        queue: Arc<dyn IngestionQueue>,
        processor: Arc<TelemetryProcessor>,
        metrics: Metrics,
        batch_size: usize,
        shard_count: usize,
        idle_delay: Duration,
    ) -> Self {
        Self {
            queue,
            processor,
            metrics,
            batch_size: batch_size.max(1),
            shard_count: shard_count.max(1),
            idle_delay,
        }
    }

    async fn process_shard(
        queue: Arc<dyn IngestionQueue>,
        processor: Arc<TelemetryProcessor>,
        items: Vec<(usize, QueuedReading)>,
    ) -> Vec<(usize, QueuedReading, ItemResult)> {
        let mut blocked: HashSet<(String, String)> = HashSet::new();
        let mut results = Vec::with_capacity(items.len());

        for (index, item) in items {
            let key = (item.tenant_id.clone(), item.reading.vehicle_id.clone());
            if blocked.contains(&key) {
                results.push((index, item, ItemResult::Deferred));
                continue;
            }

            match processor.process(&item.tenant_id, &item.reading).await {
                Ok(outcome) => {
                    if let Err(e) = queue.ack(&item).await {
                        // Se reentregará y se descartará como obsoleta
                        warn!("⚠️ No se pudo confirmar lectura {}: {}", item.id, e);
                    }
                    results.push((index, item, ItemResult::Done(outcome)));
                }
                Err(e) if e.is_retryable() => {
                    warn!(
                        "⚠️ Fallo procesando lectura de {}/{}: {}",
                        item.tenant_id, item.reading.vehicle_id, e
                    );
                    blocked.insert(key);
                    results.push((index, item, ItemResult::Failed));
                }
                Err(e) => match queue.dead_letter(&item).await {
                    Ok(()) => {
                        error!(
                            "❌ Lectura {} de {}/{} descartada: {}",
                            item.id, item.tenant_id, item.reading.vehicle_id, e
                        );
                        results.push((index, item, ItemResult::DeadLettered));
                    }
                    Err(queue_error) => {
                        warn!("⚠️ No se pudo descartar lectura {}: {}", item.id, queue_error);
                        blocked.insert(key);
                        results.push((index, item, ItemResult::Failed));
                    }
                },
            }
        }

        results
    }

    /// Procesar un lote. Las lecturas no aplicadas vuelven a la cola.
    pub async fn run_once(&self) -> Result<BatchReport, QueueError> {
        let batch = self.queue.dequeue(self.batch_size).await?;
        let mut report = BatchReport {
            dequeued: batch.len(),
            ..BatchReport::default()
        };
        if batch.is_empty() {
            return Ok(report);
        }

        let mut shards: Vec<Vec<(usize, QueuedReading)>> = vec![Vec::new(); self.shard_count];
        for (index, item) in batch.into_iter().enumerate() {
            let shard = shard_for(&item.tenant_id, &item.reading.vehicle_id, self.shard_count);
            shards[shard].push((index, item));
        }

        let mut handles = Vec::new();
        for items in shards.into_iter().filter(|s| !s.is_empty()) {
            let backup = items.clone();
            let handle = tokio::spawn(Self::process_shard(
                self.queue.clone(),
                self.processor.clone(),
                items,
            ));
            handles.push((handle, backup));
        }

        let mut returned: Vec<(usize, QueuedReading)> = Vec::new();
        for (handle, backup) in handles {
            match handle.await {
                Ok(results) => {
                    for (index, item, result) in results {
                        match result {
                            ItemResult::Done(ProcessingOutcome::Stale) => report.stale += 1,
                            ItemResult::Done(ProcessingOutcome::Applied { .. }) => report.processed += 1,
                            ItemResult::Failed => {
                                report.failed += 1;
                                returned.push((index, item));
                            }
                            ItemResult::Deferred => {
                                report.deferred += 1;
                                returned.push((index, item));
                            }
                            ItemResult::DeadLettered => {
                                report.dead_lettered += 1;
                                self.metrics.readings_dead_lettered.inc();
                            }
                        }
                    }
                }
                Err(e) => {
                    // Las ya confirmadas se reentregan y se descartan como obsoletas
                    error!("❌ Partición de ingesta abortada: {}", e);
                    report.failed += backup.len();
                    returned.extend(backup);
                }
            }
        }

        if !returned.is_empty() {
            returned.sort_by_key(|(index, _)| *index);
            let items: Vec<QueuedReading> = returned.into_iter().map(|(_, item)| item).collect();
            self.metrics.readings_failed.inc_by(items.len() as u64);
            self.queue.nack(&items).await?;
        }

        debug!("📦 Lote de ingesta: {:?}", report);
        Ok(report)
    }

    /// Bucle principal hasta recibir la señal de apagado
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        match self.queue.requeue_in_flight().await {
            Ok(restored) if restored > 0 => info!("🔁 {} lecturas recuperadas al arrancar", restored),
            Ok(_) => {}
            Err(e) => error!("❌ No se pudieron recuperar lecturas en vuelo: {}", e),
        }

        info!(
            "⚙️ Worker de ingesta iniciado (lote {}, {} particiones)",
            self.batch_size, self.shard_count
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let idle = match self.run_once().await {
                Ok(report) => {
                    report.dequeued == 0 || report.processed + report.stale + report.dead_lettered == 0
                }
                Err(e) => {
                    error!("❌ Error en la cola de ingesta: {}", e);
                    true
                }
            };

            if idle {
                tokio::select! {
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                    _ = tokio::time::sleep(self.idle_delay) => {}
                }
            }
        }

        info!("👋 Worker de ingesta detenido");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_is_stable_and_in_range() {
        for vehicle in ["VAN-1", "VAN-2", "TRUCK-9", "MOTO-3"] {
            let shard = shard_for("acme", vehicle, 4);
            assert!(shard < 4);
            assert_eq!(shard, shard_for("acme", vehicle, 4));
        }
        assert_eq!(shard_for("acme", "VAN-1", 0), 0);
    }
}
