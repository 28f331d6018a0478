//! Servicio de predicción de duración y combustible
//!
//! Ruta principal: modelo de regresión de 3 salidas sobre 8 características.
//! Ruta de respaldo: valores heurísticos fijos cuando no hay modelo cargado o
//! su salida no es utilizable. `predict` nunca falla.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::models::{
    FeatureVector, Prediction, PredictionSource, VehicleType, FEATURE_COUNT, OUTPUT_COUNT,
};

/// Valores de respaldo
pub const FALLBACK_DURATION_MIN: f64 = 120.0;
pub const FALLBACK_FUEL_LITERS: f64 = 25.0;
pub const FALLBACK_CONFIDENCE: f64 = 0.5;

/// Experiencia del conductor; no hay fuente de datos por conductor
pub const DEFAULT_DRIVER_EXPERIENCE: f64 = 5.0;

#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Insufficient training data: {samples} samples, {required} required")]
    InsufficientData { samples: usize, required: usize },

    #[error("Training system is singular")]
    SingularSystem,

    #[error("Model file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Model serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Modelo de regresión de 3 salidas: duración, combustible, confianza
pub trait RegressionModel: Send + Sync {
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> [f64; OUTPUT_COUNT];
}

/// Regresión lineal sobre características estandarizadas
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearRegressionModel {
    pub means: [f64; FEATURE_COUNT],
    pub scales: [f64; FEATURE_COUNT],
    pub weights: [[f64; FEATURE_COUNT]; OUTPUT_COUNT],
    pub intercepts: [f64; OUTPUT_COUNT],
    pub sample_count: usize,
    pub trained_at: DateTime<Utc>,
}

impl LinearRegressionModel {
    pub fn standardize(&self, features: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut z = [0.0; FEATURE_COUNT];
        for j in 0..FEATURE_COUNT {
            z[j] = (features[j] - self.means[j]) / self.scales[j];
        }
        z
    }
}

impl RegressionModel for LinearRegressionModel {
    fn predict(&self, features: &[f64; FEATURE_COUNT]) -> [f64; OUTPUT_COUNT] {
        let z = self.standardize(features);
        let mut out = self.intercepts;
        for (k, row) in self.weights.iter().enumerate() {
            out[k] += row.iter().zip(z.iter()).map(|(w, x)| w * x).sum::<f64>();
        }
        out
    }
}

/// Nivel de tráfico según la hora: punta 0.8, día 0.5, noche 0.2
pub fn traffic_for_hour(hour: u32) -> f64 {
    match hour {
        7..=9 | 17..=19 => 0.8,
        6..=21 => 0.5,
        _ => 0.2,
    }
}

#[derive(Clone, Default)]
pub struct DurationFuelPredictor {
    model: Option<Arc<dyn RegressionModel>>,
}

impl DurationFuelPredictor {
    pub fn new(model: Option<Arc<dyn RegressionModel>>) -> Self {
        if model.is_none() {
            log::warn!("⚠️ Sin modelo de regresión cargado; se usarán valores de respaldo");
        }
        Self { model }
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }

    /// Derivar el vector de características de una ruta
    pub fn features(
        total_distance_km: f64,
        stop_count: usize,
        vehicle_type: VehicleType,
        departure_time: DateTime<Utc>,
        traffic_level: Option<f64>,
        weather_severity: Option<f64>,
    ) -> FeatureVector {
        let hour = departure_time.hour();
        FeatureVector {
            total_distance_km,
            traffic_level: traffic_level.unwrap_or_else(|| traffic_for_hour(hour)),
            weather_severity: weather_severity.unwrap_or(0.0),
            hour_of_day: hour as f64,
            day_of_week: departure_time.weekday().num_days_from_monday() as f64,
            vehicle_type_flag: vehicle_type.feature_flag(),
            driver_experience: DEFAULT_DRIVER_EXPERIENCE,
            stop_count: stop_count as f64,
        }
    }

    pub fn fallback() -> Prediction {
        Prediction {
            duration_min: FALLBACK_DURATION_MIN,
            fuel_liters: FALLBACK_FUEL_LITERS,
            confidence: FALLBACK_CONFIDENCE,
            source: PredictionSource::Fallback,
        }
    }

    pub fn predict(&self, features: &FeatureVector) -> Prediction {
        let Some(model) = &self.model else {
            return Self::fallback();
        };

        let [duration, fuel, confidence] = model.predict(&features.to_array());
        if !(duration.is_finite() && fuel.is_finite() && confidence.is_finite()) {
            log::warn!("⚠️ Salida del modelo no finita, usando valores de respaldo");
            return Self::fallback();
        }

        Prediction {
            duration_min: duration.max(0.0),
            fuel_liters: fuel.max(0.0),
            confidence: confidence.clamp(0.0, 1.0),
            source: PredictionSource::Model,
        }
    }
}

/// Almacén del modelo serializado en disco (JSON)
#[derive(Debug, Clone)]
pub struct ModelStore {
    path: PathBuf,
}

impl ModelStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cargar el modelo. Un archivo ausente o corrupto no es un error de arranque.
    pub fn load(&self) -> Result<Option<LinearRegressionModel>, PredictionError> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!("ℹ️ No hay modelo en {}", self.path.display());
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str::<LinearRegressionModel>(&raw) {
            Ok(model) => {
                log::info!(
                    "🧠 Modelo cargado desde {} ({} muestras)",
                    self.path.display(),
                    model.sample_count
                );
                Ok(Some(model))
            }
            Err(e) => {
                log::error!("❌ Modelo corrupto en {}: {}", self.path.display(), e);
                Ok(None)
            }
        }
    }

    pub fn save(&self, model: &LinearRegressionModel) -> Result<(), PredictionError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(model)?)?;
        log::info!("💾 Modelo guardado en {}", self.path.display());
        Ok(())
    }
}
