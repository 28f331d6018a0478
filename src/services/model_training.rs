//! Entrenamiento offline del modelo de duración y combustible
//!
//! Mínimos cuadrados con regularización ridge sobre características
//! estandarizadas. Una de cada cinco muestras se reserva para validación.

use chrono::Utc;
use nalgebra::DMatrix;
use serde::Serialize;

use super::prediction_service::{LinearRegressionModel, PredictionError, RegressionModel};
use crate::models::{TrainingSample, FEATURE_COUNT, OUTPUT_COUNT};

/// Mínimo de muestras para aceptar un entrenamiento
pub const MIN_TRAINING_SAMPLES: usize = 100;

/// Regularización ridge
pub const RIDGE_LAMBDA: f64 = 1e-3;

const VALIDATION_STRIDE: usize = 5;

#[derive(Debug, Clone, Serialize)]
pub struct TrainingReport {
    pub training_samples: usize,
    pub validation_samples: usize,
    pub mae_duration_min: f64,
    pub mae_fuel_liters: f64,
    pub mae_confidence: f64,
}

fn targets(sample: &TrainingSample) -> [f64; OUTPUT_COUNT] {
    [
        sample.actual_duration_min,
        sample.actual_fuel_liters,
        if sample.on_time { 1.0 } else { 0.0 },
    ]
}

/// Resolver (ZᵀZ + λI) W = ZᵀY por Cholesky; `None` si no es definida positiva
fn solve_normal_equations(gram: DMatrix<f64>, rhs: &DMatrix<f64>) -> Option<DMatrix<f64>> {
    let solution = gram.cholesky()?.solve(rhs);
    solution.iter().all(|v| v.is_finite()).then_some(solution)
}

/// Entrenar el modelo a partir de muestras históricas
pub fn train(samples: &[TrainingSample]) -> Result<(LinearRegressionModel, TrainingReport), PredictionError> {
    if samples.len() < MIN_TRAINING_SAMPLES {
        return Err(PredictionError::InsufficientData {
            samples: samples.len(),
            required: MIN_TRAINING_SAMPLES,
        });
    }

    let (validation, training): (Vec<_>, Vec<_>) = samples
        .iter()
        .enumerate()
        .partition(|(i, _)| i % VALIDATION_STRIDE == VALIDATION_STRIDE - 1);
    let training: Vec<&TrainingSample> = training.into_iter().map(|(_, s)| s).collect();
    let validation: Vec<&TrainingSample> = validation.into_iter().map(|(_, s)| s).collect();
    let rows = training.len();

    let x = DMatrix::from_fn(rows, FEATURE_COUNT, |i, j| training[i].features.to_array()[j]);
    let y = DMatrix::from_fn(rows, OUTPUT_COUNT, |i, k| targets(training[i])[k]);

    let mut means = [0.0; FEATURE_COUNT];
    let mut scales = [0.0; FEATURE_COUNT];
    for (j, column) in x.column_iter().enumerate() {
        let mean = column.mean();
        let std_dev = column.map(|v| (v - mean).powi(2)).mean().sqrt();
        means[j] = mean;
        // Característica constante: su columna estandarizada queda en cero
        scales[j] = if std_dev < 1e-12 { 1.0 } else { std_dev };
    }

    let mut intercepts = [0.0; OUTPUT_COUNT];
    for (k, column) in y.column_iter().enumerate() {
        intercepts[k] = column.mean();
    }

    let z = DMatrix::from_fn(rows, FEATURE_COUNT, |i, j| (x[(i, j)] - means[j]) / scales[j]);
    let centered = DMatrix::from_fn(rows, OUTPUT_COUNT, |i, k| y[(i, k)] - intercepts[k]);

    let gram = z.transpose() * &z + DMatrix::<f64>::identity(FEATURE_COUNT, FEATURE_COUNT) * RIDGE_LAMBDA;
    let rhs = z.transpose() * &centered;
    let solution = solve_normal_equations(gram, &rhs).ok_or(PredictionError::SingularSystem)?;

    let mut weights = [[0.0; FEATURE_COUNT]; OUTPUT_COUNT];
    for (k, row) in weights.iter_mut().enumerate() {
        for (j, weight) in row.iter_mut().enumerate() {
            *weight = solution[(j, k)];
        }
    }

    let model = LinearRegressionModel {
        means,
        scales,
        weights,
        intercepts,
        sample_count: training.len(),
        trained_at: Utc::now(),
    };

    let mut mae = [0.0; OUTPUT_COUNT];
    for sample in &validation {
        let predicted = model.predict(&sample.features.to_array());
        let actual = targets(sample);
        for k in 0..OUTPUT_COUNT {
            mae[k] += (predicted[k] - actual[k]).abs() / validation.len() as f64;
        }
    }

    let report = TrainingReport {
        training_samples: training.len(),
        validation_samples: validation.len(),
        mae_duration_min: mae[0],
        mae_fuel_liters: mae[1],
        mae_confidence: mae[2],
    };

    log::info!(
        "🧠 Modelo entrenado: {} muestras de entrenamiento, {} de validación, MAE duración {:.2} min",
        report.training_samples,
        report.validation_samples,
        report.mae_duration_min
    );

    Ok((model, report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FeatureVector;

    fn synthetic(count: usize) -> Vec<TrainingSample> {
        (0..count)
            .map(|i| {
                let features = FeatureVector {
                    total_distance_km: 5.0 + ((i * 37) % 200) as f64,
                    traffic_level: ((i * 13) % 10) as f64 / 10.0,
                    weather_severity: ((i * 7) % 5) as f64 / 5.0,
                    hour_of_day: (i % 24) as f64,
                    day_of_week: (i % 7) as f64,
                    vehicle_type_flag: (i % 5) as f64,
                    driver_experience: 5.0,
                    stop_count: (i % 12) as f64,
                };
                TrainingSample {
                    actual_duration_min: 10.0
                        + 1.5 * features.total_distance_km
                        + 30.0 * features.traffic_level
                        + 4.0 * features.stop_count,
                    actual_fuel_liters: 0.12 * features.total_distance_km + 2.0 * features.weather_severity,
                    on_time: features.traffic_level < 0.6,
                    features,
                }
            })
            .collect()
    }

    #[test]
    fn test_rejects_insufficient_data() {
        match train(&synthetic(99)) {
            Err(PredictionError::InsufficientData { samples, required }) => {
                assert_eq!(samples, 99);
                assert_eq!(required, MIN_TRAINING_SAMPLES);
            }
            other => panic!("se esperaba InsufficientData, llegó {:?}", other.map(|(_, r)| r)),
        }
    }

    #[test]
    fn test_recovers_linear_relationship() {
        let samples = synthetic(250);
        let (model, report) = train(&samples).unwrap();

        assert_eq!(report.validation_samples, 50);
        assert_eq!(report.training_samples, 200);
        assert!(report.mae_duration_min < 0.5, "MAE {}", report.mae_duration_min);
        assert!(report.mae_fuel_liters < 0.05, "MAE {}", report.mae_fuel_liters);

        let features = samples[7].features.to_array();
        let [duration, fuel, _] = model.predict(&features);
        assert!((duration - samples[7].actual_duration_min).abs() < 0.5);
        assert!((fuel - samples[7].actual_fuel_liters).abs() < 0.05);
    }

    #[test]
    fn test_solve_diagonal_system() {
        let gram = DMatrix::<f64>::identity(FEATURE_COUNT, FEATURE_COUNT) * 2.0;
        let rhs = DMatrix::from_fn(FEATURE_COUNT, 1, |i, _| 2.0 * (i + 1) as f64);

        let solution = solve_normal_equations(gram, &rhs).unwrap();
        for i in 0..FEATURE_COUNT {
            assert!((solution[(i, 0)] - (i + 1) as f64).abs() < 1e-12);
        }
    }

    #[test]
    fn test_solve_rank_deficient_system() {
        let gram = DMatrix::from_element(FEATURE_COUNT, FEATURE_COUNT, 1.0);
        let rhs = DMatrix::from_element(FEATURE_COUNT, 1, 1.0);
        assert!(solve_normal_equations(gram, &rhs).is_none());
    }
}
