//! Cache de rutas optimizadas
//!
//! Las entradas se indexan por (route_id, tenant_id) y expiran por TTL.
//! Una entrada ilegible se trata como ausente.

use anyhow::Result;
use std::sync::Arc;

use super::{make_key, CacheStore};
use crate::models::OptimizedRoute;

#[derive(Clone)]
pub struct RouteCache {
    store: Arc<dyn CacheStore>,
    ttl_secs: u64,
}

impl RouteCache {
    pub fn new(store: Arc<dyn CacheStore>, ttl_secs: u64) -> Self {
        Self { store, ttl_secs }
    }

    /// Generar clave de cache de ruta optimizada
    pub fn route_key(route_id: &str, tenant_id: &str) -> String {
        make_key("route_optimization", &format!("{}:{}", tenant_id, route_id))
    }

    pub async fn get(&self, route_id: &str, tenant_id: &str) -> Option<OptimizedRoute> {
        let key = Self::route_key(route_id, tenant_id);
        match self.store.get_raw(&key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(route) => Some(route),
                Err(e) => {
                    log::warn!("⚠️ Entrada de cache ilegible para {}: {}", key, e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::warn!("⚠️ Error leyendo cache de rutas {}: {}", key, e);
                None
            }
        }
    }

    pub async fn put(&self, route: &OptimizedRoute) -> Result<()> {
        let key = Self::route_key(&route.route_id, &route.tenant_id);
        let serialized = serde_json::to_string(route)?;
        self.store.set_raw(&key, serialized, self.ttl_secs).await
    }

    pub async fn invalidate(&self, route_id: &str, tenant_id: &str) -> Result<()> {
        let key = Self::route_key(route_id, tenant_id);
        log::info!("🗑️ Invalidando ruta optimizada {}", key);
        self.store.delete(&key).await
    }
}
