//! Configuración de variables de entorno
//!
//! Este módulo maneja la configuración del entorno. Todas las variables
//! tienen un valor por defecto salvo las URLs de infraestructura, que son
//! opcionales: sin `DATABASE_URL` o `REDIS_URL` el servicio arranca con
//! colaboradores en memoria.

use anyhow::{anyhow, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Umbrales del evaluador de alertas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AlertThresholds {
    /// Velocidad (km/h) por encima de la cual se emite alerta de exceso
    pub speeding_kmh: f64,
    /// Por encima de este valor la alerta es crítica
    pub critical_speed_kmh: f64,
    pub low_battery_percent: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        Self {
            speeding_kmh: 120.0,
            critical_speed_kmh: 150.0,
            low_battery_percent: 20.0,
        }
    }
}

/// Configuración del entorno
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub environment: String,
    pub port: u16,
    pub host: String,
    pub log_level: tracing::Level,
    pub cors_origins: Vec<String>,
    pub database_url: Option<String>,
    pub redis_url: Option<String>,
    pub route_cache_ttl_secs: u64,
    pub model_path: PathBuf,
    pub ingestion_batch_size: usize,
    pub ingestion_shards: usize,
    pub ingestion_idle_ms: u64,
    pub geofence_refresh_secs: u64,
    pub fuel_price_per_liter: f64,
    pub alert_thresholds: AlertThresholds,
}

impl Default for EnvironmentConfig {
    fn default() -> Self {
        Self {
            environment: "development".to_string(),
            port: 3000,
            host: "0.0.0.0".to_string(),
            log_level: tracing::Level::INFO,
            cors_origins: Vec::new(),
            database_url: None,
            redis_url: None,
            route_cache_ttl_secs: 3600,
            model_path: PathBuf::from("models/duration_fuel_model.json"),
            ingestion_batch_size: 100,
            ingestion_shards: 4,
            ingestion_idle_ms: 250,
            geofence_refresh_secs: 60,
            fuel_price_per_liter: 1.85,
            alert_thresholds: AlertThresholds::default(),
        }
    }
}

/// Leer una variable parseable, con valor por defecto si no está definida
fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("{} must be a valid value: {}", key, e)),
        _ => Ok(default),
    }
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl EnvironmentConfig {
    /// Construir la configuración desde variables de entorno
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let thresholds = AlertThresholds {
            speeding_kmh: env_or("SPEED_ALERT_KMH", defaults.alert_thresholds.speeding_kmh)?,
            critical_speed_kmh: env_or(
                "CRITICAL_SPEED_KMH",
                defaults.alert_thresholds.critical_speed_kmh,
            )?,
            low_battery_percent: env_or(
                "LOW_BATTERY_PERCENT",
                defaults.alert_thresholds.low_battery_percent,
            )?,
        };

        if thresholds.critical_speed_kmh < thresholds.speeding_kmh {
            return Err(anyhow!("CRITICAL_SPEED_KMH must be >= SPEED_ALERT_KMH"));
        }

        let config = Self {
            environment: env_or("ENVIRONMENT", defaults.environment)?,
            port: env_or("PORT", defaults.port)?,
            host: env_or("HOST", defaults.host)?,
            log_level: env_or("LOG_LEVEL", defaults.log_level)?,
            cors_origins: env_opt("CORS_ORIGINS")
                .map(|origins| {
                    origins
                        .split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            database_url: env_opt("DATABASE_URL"),
            redis_url: env_opt("REDIS_URL"),
            route_cache_ttl_secs: env_or("ROUTE_CACHE_TTL_SECS", defaults.route_cache_ttl_secs)?,
            model_path: env_opt("MODEL_PATH").map(PathBuf::from).unwrap_or(defaults.model_path),
            ingestion_batch_size: env_or("INGESTION_BATCH_SIZE", defaults.ingestion_batch_size)?.max(1),
            ingestion_shards: env_or("INGESTION_SHARDS", defaults.ingestion_shards)?.max(1),
            ingestion_idle_ms: env_or("INGESTION_IDLE_MS", defaults.ingestion_idle_ms)?,
            geofence_refresh_secs: env_or("GEOFENCE_REFRESH_SECS", defaults.geofence_refresh_secs)?,
            fuel_price_per_liter: env_or("FUEL_PRICE_PER_LITER", defaults.fuel_price_per_liter)?,
            alert_thresholds: thresholds,
        };

        Ok(config)
    }

    /// Verificar si estamos en modo desarrollo
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }

    /// Verificar si estamos en modo producción
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// Obtener la dirección de escucha del servidor
    pub fn server_url(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
