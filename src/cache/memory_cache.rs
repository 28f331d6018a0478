//! Cache en memoria con expiración por TTL

use anyhow::Result;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use super::CacheStore;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    expires_at: Instant,
}

/// Almacén de cache en proceso; mismo contrato que Redis
#[derive(Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait::async_trait]
impl CacheStore for MemoryCache {
    async fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone()))
    }

    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()> {
        let mut entries = self.entries.write().await;
        let now = Instant::now();
        // Barrido de expiradas en cada escritura
        entries.retain(|_, entry| entry.expires_at > now);
        entries.insert(
            key.to_string(),
            CacheEntry {
                value,
                expires_at: now + Duration::from_secs(ttl_secs),
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_set_get_delete() {
        let cache = MemoryCache::new();
        cache.set_raw("k", "v".to_string(), 60).await.unwrap();
        assert_eq!(cache.get_raw("k").await.unwrap(), Some("v".to_string()));

        cache.delete("k").await.unwrap();
        assert_eq!(cache.get_raw("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_zero_ttl_expires_immediately() {
        let cache = MemoryCache::new();
        cache.set_raw("k", "v".to_string(), 0).await.unwrap();
        assert_eq!(cache.get_raw("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_writes_evict_expired_entries() {
        let cache = MemoryCache::new();
        cache.set_raw("old", "v".to_string(), 0).await.unwrap();
        cache.set_raw("older", "v".to_string(), 0).await.unwrap();
        assert_eq!(cache.len().await, 1);

        cache.set_raw("fresh", "v".to_string(), 60).await.unwrap();
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get_raw("fresh").await.unwrap(), Some("v".to_string()));
    }
}
