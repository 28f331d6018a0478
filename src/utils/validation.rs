//! Utilidades de validación
//!
//! Validación en la frontera de ingreso: las lecturas y solicitudes con
//! valores fuera de rango se rechazan, nunca se corrigen en silencio.

use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::{GeoPoint, RouteOptimizationRequest, TelemetryReading};

/// Validar formato de coordenadas GPS
pub fn validate_coordinates(lat: f64, lng: f64) -> Result<(), ValidationError> {
    if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
        let mut error = ValidationError::new("latitude");
        error.add_param("value".into(), &lat);
        error.add_param("range".into(), &"-90.0 to 90.0".to_string());
        return Err(error);
    }

    if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
        let mut error = ValidationError::new("longitude");
        error.add_param("value".into(), &lng);
        error.add_param("range".into(), &"-180.0 to 180.0".to_string());
        return Err(error);
    }

    Ok(())
}

/// Validar que un valor sea finito
pub fn validate_finite(value: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::new("finite"));
    }
    Ok(())
}

fn add_point_errors(errors: &mut ValidationErrors, field: &'static str, point: &GeoPoint) {
    if let Err(error) = validate_coordinates(point.latitude, point.longitude) {
        errors.add(field, error);
    }
}

/// Validar una lectura de telemetría completa
pub fn validate_reading(reading: &TelemetryReading) -> Result<(), ValidationErrors> {
    let mut errors = match reading.validate() {
        Ok(()) => ValidationErrors::new(),
        Err(errors) => errors,
    };

    if let Err(error) = validate_coordinates(reading.latitude, 0.0) {
        errors.add("latitude", error);
    }
    if let Err(error) = validate_coordinates(0.0, reading.longitude) {
        errors.add("longitude", error);
    }
    if let Err(error) = validate_finite(reading.speed) {
        errors.add("speed", error);
    }
    if let Some(battery) = reading.battery_percent {
        if let Err(error) = validate_finite(battery) {
            errors.add("battery_percent", error);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validar una solicitud de optimización de ruta
pub fn validate_route_request(request: &RouteOptimizationRequest) -> Result<(), ValidationErrors> {
    let mut errors = match request.validate() {
        Ok(()) => ValidationErrors::new(),
        Err(errors) => errors,
    };

    add_point_errors(&mut errors, "origin", &request.origin);
    add_point_errors(&mut errors, "destination", &request.destination);
    for stop in &request.stops {
        add_point_errors(&mut errors, "stop_location", &stop.location);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
