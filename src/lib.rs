//! Fleet Tracker
//!
//! Backend de telemetría de flota: ingesta de lecturas GPS, detección de
//! viajes, alertas por umbral y geocercas, y optimización de rutas de
//! entrega con predicción de duración y combustible.

pub mod cache;
pub mod config;
pub mod controllers;
pub mod dto;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod queue;
pub mod repositories;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

pub use routes::create_router;
pub use state::{AppState, Collaborators};
