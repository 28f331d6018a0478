use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, info, warn};

use super::{IngestionQueue, QueueError, QueuedReading};
use crate::models::TelemetryReading;

const TENANTS_KEY: &str = "fleet_tracker:telemetry:tenants";

/// Cola de ingesta sobre listas Redis
///
/// `RPUSH` a `fleet_tracker:telemetry:{tenant}`, `LMOVE` a la lista de
/// procesamiento del tenant y `LREM` al confirmar. Los fallos permanentes
/// se mueven a `fleet_tracker:telemetry:{tenant}:dead`.
#[derive(Clone)]
pub struct RedisIngestionQueue {
    conn: ConnectionManager,
}

impl RedisIngestionQueue {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub fn queue_key(tenant_id: &str) -> String {
        format!("fleet_tracker:telemetry:{}", tenant_id)
    }

    pub fn processing_key(tenant_id: &str) -> String {
        format!("fleet_tracker:telemetry:{}:processing", tenant_id)
    }

    pub fn dead_letter_key(tenant_id: &str) -> String {
        format!("fleet_tracker:telemetry:{}:dead", tenant_id)
    }

    async fn tenants(&self) -> Result<Vec<String>, QueueError> {
        let mut conn = self.conn.clone();
        let mut tenants: Vec<String> = redis::cmd("SMEMBERS")
            .arg(TENANTS_KEY)
            .query_async(&mut conn)
            .await?;
        tenants.sort();
        Ok(tenants)
    }

    async fn push(&self, tenant_id: &str, payloads: Vec<String>) -> Result<(), QueueError> {
        if payloads.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn.clone();
        let count = payloads.len();
        let _: i64 = redis::cmd("SADD")
            .arg(TENANTS_KEY)
            .arg(tenant_id)
            .query_async(&mut conn)
            .await?;
        let _: i64 = redis::cmd("RPUSH")
            .arg(Self::queue_key(tenant_id))
            .arg(payloads)
            .query_async(&mut conn)
            .await?;
        debug!("📥 {} lecturas encoladas para tenant {}", count, tenant_id);
        Ok(())
    }
}

#[async_trait]
impl IngestionQueue for RedisIngestionQueue {
    async fn enqueue(&self, tenant_id: &str, reading: &TelemetryReading) -> Result<(), QueueError> {
        let payload = QueuedReading::seal(tenant_id, reading)?;
        self.push(tenant_id, vec![payload]).await
    }

    async fn enqueue_batch(&self, tenant_id: &str, readings: &[TelemetryReading]) -> Result<(), QueueError> {
        let payloads = readings
            .iter()
            .map(|reading| QueuedReading::seal(tenant_id, reading))
            .collect::<Result<Vec<_>, _>>()?;
        self.push(tenant_id, payloads).await
    }

    async fn dequeue(&self, max: usize) -> Result<Vec<QueuedReading>, QueueError> {
        let mut conn = self.conn.clone();
        let mut active = self.tenants().await?;
        let mut batch = Vec::new();

        while batch.len() < max && !active.is_empty() {
            let mut still_active = Vec::with_capacity(active.len());
            for tenant_id in active {
                if batch.len() >= max {
                    still_active.push(tenant_id);
                    continue;
                }
                let moved: Option<String> = redis::cmd("LMOVE")
                    .arg(Self::queue_key(&tenant_id))
                    .arg(Self::processing_key(&tenant_id))
                    .arg("LEFT")
                    .arg("RIGHT")
                    .query_async(&mut conn)
                    .await?;

                let Some(payload) = moved else { continue };
                match QueuedReading::open(payload.clone()) {
                    Ok(item) => batch.push(item),
                    Err(e) => {
                        // Entrada ilegible: se descarta para no bloquear la cola
                        warn!("⚠️ Entrada ilegible en cola de {}: {}", tenant_id, e);
                        let _: i64 = redis::cmd("LREM")
                            .arg(Self::processing_key(&tenant_id))
                            .arg(1)
                            .arg(payload)
                            .query_async(&mut conn)
                            .await?;
                    }
                }
                still_active.push(tenant_id);
            }
            active = still_active;
        }

        Ok(batch)
    }

    async fn ack(&self, item: &QueuedReading) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("LREM")
            .arg(Self::processing_key(&item.tenant_id))
            .arg(1)
            .arg(item.payload())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn nack(&self, items: &[QueuedReading]) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        // LPUSH en orden inverso deja la cabeza en el orden original
        for item in items.iter().rev() {
            let _: i64 = redis::cmd("LREM")
                .arg(Self::processing_key(&item.tenant_id))
                .arg(1)
                .arg(item.payload())
                .query_async(&mut conn)
                .await?;
            let _: i64 = redis::cmd("LPUSH")
                .arg(Self::queue_key(&item.tenant_id))
                .arg(item.payload())
                .query_async(&mut conn)
                .await?;
        }
        Ok(())
    }

    async fn dead_letter(&self, item: &QueuedReading) -> Result<(), QueueError> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("RPUSH")
            .arg(Self::dead_letter_key(&item.tenant_id))
            .arg(item.payload())
            .query_async(&mut conn)
            .await?;
        let _: i64 = redis::cmd("LREM")
            .arg(Self::processing_key(&item.tenant_id))
            .arg(1)
            .arg(item.payload())
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn dead_lettered(&self, tenant_id: &str) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let len: usize = redis::cmd("LLEN")
            .arg(Self::dead_letter_key(tenant_id))
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }

    async fn requeue_in_flight(&self) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let mut restored = 0;

        for tenant_id in self.tenants().await? {
            loop {
                let moved: Option<String> = redis::cmd("LMOVE")
                    .arg(Self::processing_key(&tenant_id))
                    .arg(Self::queue_key(&tenant_id))
                    .arg("RIGHT")
                    .arg("LEFT")
                    .query_async(&mut conn)
                    .await?;
                if moved.is_none() {
                    break;
                }
                restored += 1;
            }
        }

        if restored > 0 {
            info!("🔁 {} lecturas sin confirmar devueltas a la cola", restored);
        }
        Ok(restored)
    }

    async fn pending(&self, tenant_id: &str) -> Result<usize, QueueError> {
        let mut conn = self.conn.clone();
        let len: usize = redis::cmd("LLEN")
            .arg(Self::queue_key(tenant_id))
            .query_async(&mut conn)
            .await?;
        Ok(len)
    }
}
