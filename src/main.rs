use anyhow::Result;
use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info, warn};

use fleet_tracker::cache::{CacheConfig, RedisClient};
use fleet_tracker::config::{DatabaseConfig, EnvironmentConfig};
use fleet_tracker::metrics::Metrics;
use fleet_tracker::queue::RedisIngestionQueue;
use fleet_tracker::repositories::PgFleetRepository;
use fleet_tracker::services::{ModelStore, RedisEventPublisher, RegressionModel};
use fleet_tracker::{create_router, AppState, Collaborators};

#[tokio::main]
async fn main() -> Result<()> {
    // Cargar variables de entorno
    dotenv().ok();
    let config = EnvironmentConfig::from_env()?;

    // Configurar logging
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .init();

    info!("🚚 Fleet Tracker - Telemetría y optimización de rutas");
    info!("================================================");

    let mut collaborators = Collaborators::in_memory();

    // Inicializar base de datos
    match &config.database_url {
        Some(url) => {
            let pool = DatabaseConfig::new(url.clone()).create_pool().await.map_err(|e| {
                error!("❌ Error conectando a la base de datos: {}", e);
                anyhow::anyhow!("Error de base de datos: {}", e)
            })?;
            collaborators.repository = Arc::new(PgFleetRepository::new(pool));
            info!("✅ PostgreSQL conectado");
        }
        None => warn!("⚠️ DATABASE_URL no definida: usando repositorio en memoria"),
    }

    // Inicializar Redis: cola de ingesta, cache de rutas y eventos
    match &config.redis_url {
        Some(url) => {
            let redis_config = CacheConfig {
                redis_url: url.clone(),
                default_ttl: config.route_cache_ttl_secs,
            };
            let redis = RedisClient::new(redis_config).await.map_err(|e| {
                error!("❌ Error conectando a Redis: {}", e);
                anyhow::anyhow!("Error de Redis: {}", e)
            })?;
            collaborators.queue = Arc::new(RedisIngestionQueue::new(redis.connection()));
            collaborators.cache = Arc::new(redis.clone());
            collaborators.publisher = Arc::new(RedisEventPublisher::new(redis.clone()));
            collaborators.redis = Some(redis);
        }
        None => warn!("⚠️ REDIS_URL no definida: cola, cache y eventos en memoria"),
    }

    // Modelo de predicción; su ausencia no impide arrancar
    collaborators.model = match ModelStore::new(config.model_path.clone()).load() {
        Ok(Some(model)) => Some(Arc::new(model) as Arc<dyn RegressionModel>),
        Ok(None) => None,
        Err(e) => {
            warn!("⚠️ No se pudo leer el modelo: {}", e);
            None
        }
    };

    let state = AppState::new(config.clone(), collaborators, Metrics::new()?);

    // Worker de ingesta en background
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = Arc::new(state.ingestion_worker());
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let app = create_router(state);
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    info!("🌐 Servidor iniciando en {}", config.server_url());
    info!("🔍 Endpoints disponibles:");
    info!("   POST   /api/telemetry - Registrar lectura");
    info!("   POST   /api/telemetry/batch - Registrar lote de lecturas");
    info!("   GET    /api/vehicles/:vehicle_id/trip - Viaje activo");
    info!("   POST   /api/alerts/:alert_id/acknowledge - Reconocer alerta");
    info!("   POST   /api/routes/optimize - Optimizar ruta");
    info!("   DELETE /api/routes/:route_id/cache - Invalidar ruta en cache");
    info!("   GET    /health - Health check");
    info!("   GET    /metrics - Métricas Prometheus");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("❌ Error del servidor: {}", e);
    }

    // Detener el worker; lo no confirmado se recupera al siguiente arranque
    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        error!("❌ Worker de ingesta terminó con error: {}", e);
    }

    info!("👋 Servidor terminado");
    Ok(())
}

/// Señal de apagado graceful
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("❌ No se pudo instalar el manejador de Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("❌ No se pudo instalar el manejador de señales: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("🛑 Señal Ctrl+C recibida, apagando servidor...");
        },
        _ = terminate => {
            info!("🛑 Señal de terminación recibida, apagando servidor...");
        },
    }
}
