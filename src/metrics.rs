//! Métricas Prometheus del servicio

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub readings_accepted: IntCounter,
    pub readings_rejected: IntCounter,
    pub readings_processed: IntCounter,
    pub readings_stale: IntCounter,
    pub readings_failed: IntCounter,
    pub readings_dead_lettered: IntCounter,
    pub alerts_emitted: IntCounterVec,
    pub trips_opened: IntCounter,
    pub trips_closed: IntCounter,
    pub optimization_cache_hits: IntCounter,
    pub optimization_cache_misses: IntCounter,
}

fn counter(registry: &Registry, name: &str, help: &str) -> prometheus::Result<IntCounter> {
    let counter = IntCounter::with_opts(Opts::new(name, help).namespace("fleet_tracker"))?;
    registry.register(Box::new(counter.clone()))?;
    Ok(counter)
}

impl Metrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let alerts_emitted = IntCounterVec::new(
            Opts::new("alerts_emitted_total", "Alerts emitted by kind").namespace("fleet_tracker"),
            &["kind"],
        )?;
        registry.register(Box::new(alerts_emitted.clone()))?;

        Ok(Self {
            readings_accepted: counter(&registry, "readings_accepted_total", "Readings accepted at ingress")?,
            readings_rejected: counter(&registry, "readings_rejected_total", "Readings rejected by validation")?,
            readings_processed: counter(&registry, "readings_processed_total", "Readings applied to vehicle state")?,
            readings_stale: counter(&registry, "readings_stale_total", "Out-of-order or duplicate readings skipped")?,
            readings_failed: counter(&registry, "readings_failed_total", "Readings returned to the queue after a failure")?,
            readings_dead_lettered: counter(
                &registry,
                "readings_dead_lettered_total",
                "Readings moved to the dead-letter list after a permanent failure",
            )?,
            alerts_emitted,
            trips_opened: counter(&registry, "trips_opened_total", "Trips opened")?,
            trips_closed: counter(&registry, "trips_closed_total", "Trips closed")?,
            optimization_cache_hits: counter(&registry, "optimization_cache_hits_total", "Route optimization cache hits")?,
            optimization_cache_misses: counter(
                &registry,
                "optimization_cache_misses_total",
                "Route optimization cache misses",
            )?,
            registry,
        })
    }

    /// Exportar en formato de texto Prometheus
    pub fn render(&self) -> String {
        let mut buffer = Vec::new();
        if let Err(e) = TextEncoder::new().encode(&self.registry.gather(), &mut buffer) {
            log::error!("❌ Error codificando métricas: {}", e);
            return String::new();
        }
        String::from_utf8_lossy(&buffer).into_owned()
    }
}
