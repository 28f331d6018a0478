//! Middleware del sistema
//!
//! Este módulo contiene el middleware de CORS y la extracción del tenant.

pub mod cors;
pub mod tenant;

pub use cors::*;
pub use tenant::*;
