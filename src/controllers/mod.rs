pub mod route_optimization_controller;
pub mod telemetry_controller;
