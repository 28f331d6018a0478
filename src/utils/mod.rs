//! Utilidades del sistema
//!
//! Este módulo contiene utilidades para manejo de errores, validación
//! y cálculos geoespaciales.

pub mod errors;
pub mod geo_math;
pub mod validation;

pub use errors::{AppError, AppResult};
