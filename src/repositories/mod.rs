//! Repositorios
//!
//! Acceso a datos de la flota: PostgreSQL en producción y una
//! implementación en memoria para pruebas.

pub mod fleet_repository;
pub mod pg_fleet_repository;

pub use fleet_repository::{FleetRepository, InMemoryFleetRepository};
pub use pg_fleet_repository::PgFleetRepository;
