//! Modelo de predicción de duración y combustible

use serde::{Deserialize, Serialize};

/// Número de características del vector de entrada
pub const FEATURE_COUNT: usize = 8;

/// Número de salidas del modelo: duración, combustible, confianza
pub const OUTPUT_COUNT: usize = 3;

/// Origen de la predicción
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PredictionSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub duration_min: f64,
    pub fuel_liters: f64,
    /// Confianza en [0, 1]
    pub confidence: f64,
    pub source: PredictionSource,
}

/// Vector de características del predictor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub total_distance_km: f64,
    pub traffic_level: f64,
    pub weather_severity: f64,
    pub hour_of_day: f64,
    pub day_of_week: f64,
    pub vehicle_type_flag: f64,
    pub driver_experience: f64,
    pub stop_count: f64,
}

impl FeatureVector {
    pub fn to_array(&self) -> [f64; FEATURE_COUNT] {
        [
            self.total_distance_km,
            self.traffic_level,
            self.weather_severity,
            self.hour_of_day,
            self.day_of_week,
            self.vehicle_type_flag,
            self.driver_experience,
            self.stop_count,
        ]
    }
}

/// Muestra histórica para entrenamiento offline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSample {
    pub features: FeatureVector,
    pub actual_duration_min: f64,
    pub actual_fuel_liters: f64,
    /// Si la ruta terminó a tiempo; objetivo de la salida de confianza
    pub on_time: bool,
}
