//! Cache
//!
//! Este módulo contiene los sistemas de cache: Redis en producción y un
//! almacén en memoria para pruebas y ejecución local.

pub mod cache_config;
pub mod geofence_cache;
pub mod memory_cache;
pub mod redis_client;
pub mod route_cache;

use anyhow::Result;

pub use cache_config::CacheConfig;
pub use geofence_cache::GeofenceCache;
pub use memory_cache::MemoryCache;
pub use redis_client::RedisClient;
pub use route_cache::RouteCache;

/// Operaciones básicas de cache sobre valores serializados
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    async fn get_raw(&self, key: &str) -> Result<Option<String>>;

    async fn set_raw(&self, key: &str, value: String, ttl_secs: u64) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;
}

/// Generar clave de cache con prefijo del servicio
pub fn make_key(prefix: &str, identifier: &str) -> String {
    format!("fleet_tracker:{}:{}", prefix, identifier)
}
