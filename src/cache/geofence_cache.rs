//! Cache de geocercas por tenant
//!
//! Las geocercas cambian poco; se releen del repositorio cada
//! `refresh_interval`. Si la lectura falla se sigue usando la última copia.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use crate::models::Geofence;
use crate::repositories::FleetRepository;

struct CachedFences {
    fences: Arc<Vec<Geofence>>,
    fetched_at: Instant,
}

#[derive(Clone)]
pub struct GeofenceCache {
    repository: Arc<dyn FleetRepository>,
    refresh_interval: Duration,
    entries: Arc<RwLock<HashMap<String, CachedFences>>>,
}

impl GeofenceCache {
    pub fn new(repository: Arc<dyn FleetRepository>, refresh_interval: Duration) -> Self {
        Self {
            repository,
            refresh_interval,
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn get(&self, tenant_id: &str) -> Arc<Vec<Geofence>> {
        if let Some(cached) = self.entries.read().await.get(tenant_id) {
            if cached.fetched_at.elapsed() < self.refresh_interval {
                return cached.fences.clone();
            }
        }

        match self.repository.list_geofences(tenant_id).await {
            Ok(fences) => {
                log::debug!("🗺️ {} geocercas cargadas para tenant {}", fences.len(), tenant_id);
                let fences = Arc::new(fences);
                self.entries.write().await.insert(
                    tenant_id.to_string(),
                    CachedFences {
                        fences: fences.clone(),
                        fetched_at: Instant::now(),
                    },
                );
                fences
            }
            Err(e) => {
                log::warn!("⚠️ No se pudieron cargar geocercas de {}: {}", tenant_id, e);
                self.entries
                    .read()
                    .await
                    .get(tenant_id)
                    .map(|cached| cached.fences.clone())
                    .unwrap_or_default()
            }
        }
    }

    pub async fn invalidate(&self, tenant_id: &str) {
        self.entries.write().await.remove(tenant_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GeoPoint;
    use crate::repositories::InMemoryFleetRepository;
    use uuid::Uuid;

    fn fence(tenant_id: &str) -> Geofence {
        Geofence {
            id: Uuid::new_v4(),
            tenant_id: tenant_id.to_string(),
            name: "Yard".to_string(),
            polygon: vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0), GeoPoint::new(1.0, 1.0)],
            alert_on_entry: true,
            alert_on_exit: true,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn test_fences_are_cached_until_refresh() {
        let repo = InMemoryFleetRepository::new();
        repo.add_geofence(fence("acme")).await;
        let cache = GeofenceCache::new(Arc::new(repo.clone()), Duration::from_secs(3600));

        assert_eq!(cache.get("acme").await.len(), 1);
        repo.add_geofence(fence("acme")).await;
        assert_eq!(cache.get("acme").await.len(), 1);

        cache.invalidate("acme").await;
        assert_eq!(cache.get("acme").await.len(), 2);
        assert!(cache.get("globex").await.is_empty());
    }
}
