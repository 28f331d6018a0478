//! Entrenamiento offline del modelo de duración y combustible
//!
//! Uso: train_model <muestras.json> [modelo_salida.json]
//!
//! El archivo de entrada es un array JSON de `TrainingSample`. Sin ruta de
//! salida se usa `MODEL_PATH` o la ruta por defecto de la configuración.

use anyhow::Result;
use std::env;
use std::fs;

use fleet_tracker::config::EnvironmentConfig;
use fleet_tracker::models::TrainingSample;
use fleet_tracker::services::model_training::train;
use fleet_tracker::services::{ModelStore, PredictionError};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 || args.len() > 3 {
        eprintln!("Uso: {} <muestras.json> [modelo_salida.json]", args[0]);
        eprintln!("Ejemplo: {} data/historical_routes.json models/duration_fuel_model.json", args[0]);
        std::process::exit(1);
    }

    let samples_path = &args[1];
    let output_path = match args.get(2) {
        Some(path) => path.into(),
        None => EnvironmentConfig::from_env()?.model_path,
    };

    println!("Leyendo muestras: {}", samples_path);
    let samples: Vec<TrainingSample> = serde_json::from_str(&fs::read_to_string(samples_path)?)?;
    println!("{} muestras cargadas", samples.len());

    let (model, report) = match train(&samples) {
        Ok(result) => result,
        Err(PredictionError::InsufficientData { samples, required }) => {
            eprintln!("❌ Datos insuficientes: {} muestras, se requieren al menos {}", samples, required);
            std::process::exit(2);
        }
        Err(e) => return Err(e.into()),
    };

    println!("\n=== VALIDACIÓN ===");
    println!("Muestras de entrenamiento: {}", report.training_samples);
    println!("Muestras de validación:    {}", report.validation_samples);
    println!("MAE duración:              {:.2} min", report.mae_duration_min);
    println!("MAE combustible:           {:.2} L", report.mae_fuel_liters);
    println!("MAE confianza:             {:.3}", report.mae_confidence);

    let store = ModelStore::new(output_path);
    store.save(&model)?;
    println!("\nModelo guardado en: {}", store.path().display());

    Ok(())
}
