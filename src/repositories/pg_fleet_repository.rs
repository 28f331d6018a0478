use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgArguments;
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres};
use uuid::Uuid;

use super::FleetRepository;
use crate::models::{
    Alert, AlertKind, AlertSeverity, GeoPoint, Geofence, OptimizedRoute, TelemetryReading, Trip,
    TripChange, TripStatus, VehicleSnapshot,
};
use crate::utils::errors::{not_found_error, AppResult};

type PgQuery = Query<'static, Postgres, PgArguments>;

#[derive(Debug, sqlx::FromRow)]
struct GeofenceRow {
    id: Uuid,
    tenant_id: String,
    name: String,
    polygon: Json<Vec<GeoPoint>>,
    alert_on_entry: bool,
    alert_on_exit: bool,
    is_active: bool,
}

impl From<GeofenceRow> for Geofence {
    fn from(row: GeofenceRow) -> Self {
        Geofence {
            id: row.id,
            tenant_id: row.tenant_id,
            name: row.name,
            polygon: row.polygon.0,
            alert_on_entry: row.alert_on_entry,
            alert_on_exit: row.alert_on_exit,
            is_active: row.is_active,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AlertRow {
    id: Uuid,
    tenant_id: String,
    vehicle_id: String,
    kind: String,
    severity: String,
    geofence_id: Option<Uuid>,
    message: String,
    latitude: f64,
    longitude: f64,
    timestamp: DateTime<Utc>,
    acknowledged: bool,
}

impl AlertRow {
    fn into_alert(self) -> Option<Alert> {
        let kind = match self.kind.as_str() {
            "speeding" => AlertKind::Speeding,
            "low_battery" => AlertKind::LowBattery,
            "geofence_entry" => AlertKind::GeofenceEntry,
            "geofence_exit" => AlertKind::GeofenceExit,
            _ => return None,
        };
        let severity = match self.severity.as_str() {
            "low" => AlertSeverity::Low,
            "medium" => AlertSeverity::Medium,
            "high" => AlertSeverity::High,
            "critical" => AlertSeverity::Critical,
            _ => return None,
        };
        Some(Alert {
            id: self.id,
            tenant_id: self.tenant_id,
            vehicle_id: self.vehicle_id,
            kind,
            severity,
            geofence_id: self.geofence_id,
            message: self.message,
            location: GeoPoint::new(self.latitude, self.longitude),
            timestamp: self.timestamp,
            acknowledged: self.acknowledged,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    tenant_id: String,
    vehicle_id: String,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    start_latitude: f64,
    start_longitude: f64,
    end_latitude: Option<f64>,
    end_longitude: Option<f64>,
    total_distance_km: f64,
    max_speed: f64,
    status: String,
}

impl From<TripRow> for Trip {
    fn from(row: TripRow) -> Self {
        let end_location = match (row.end_latitude, row.end_longitude) {
            (Some(latitude), Some(longitude)) => Some(GeoPoint::new(latitude, longitude)),
            _ => None,
        };
        Trip {
            trip_id: row.id,
            tenant_id: row.tenant_id,
            vehicle_id: row.vehicle_id,
            start_time: row.start_time,
            end_time: row.end_time,
            start_location: GeoPoint::new(row.start_latitude, row.start_longitude),
            end_location,
            total_distance_km: row.total_distance_km,
            max_speed: row.max_speed,
            status: if row.status == TripStatus::Closed.as_str() {
                TripStatus::Closed
            } else {
                TripStatus::Active
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct LastReadingRow {
    latitude: f64,
    longitude: f64,
    recorded_at: DateTime<Utc>,
}

/// Repositorio PostgreSQL de la flota
pub struct PgFleetRepository {
    pool: PgPool,
}

impl PgFleetRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn telemetry_query(tenant_id: &str, reading: &TelemetryReading) -> PgQuery {
        sqlx::query(
            r#"
            INSERT INTO telemetry_readings (id, tenant_id, vehicle_id, device_id, latitude, longitude,
                speed, heading, accuracy, satellite_count, odometer, ignition_on, battery_percent,
                recorded_at, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(tenant_id.to_string())
        .bind(reading.vehicle_id.clone())
        .bind(reading.device_id.clone())
        .bind(reading.latitude)
        .bind(reading.longitude)
        .bind(reading.speed)
        .bind(reading.heading)
        .bind(reading.accuracy)
        .bind(reading.satellite_count.map(|c| c as i32))
        .bind(reading.odometer)
        .bind(reading.ignition_on)
        .bind(reading.battery_percent)
        .bind(reading.timestamp)
        .bind(Utc::now())
    }

    fn insert_trip_query(trip: &Trip) -> PgQuery {
        sqlx::query(
            r#"
            INSERT INTO trips (id, tenant_id, vehicle_id, start_time, end_time, start_latitude,
                start_longitude, end_latitude, end_longitude, total_distance_km, max_speed, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(trip.trip_id)
        .bind(trip.tenant_id.clone())
        .bind(trip.vehicle_id.clone())
        .bind(trip.start_time)
        .bind(trip.end_time)
        .bind(trip.start_location.latitude)
        .bind(trip.start_location.longitude)
        .bind(trip.end_location.map(|p| p.latitude))
        .bind(trip.end_location.map(|p| p.longitude))
        .bind(trip.total_distance_km)
        .bind(trip.max_speed)
        .bind(trip.status.as_str())
    }

    fn update_trip_query(trip: &Trip) -> PgQuery {
        sqlx::query(
            r#"
            UPDATE trips
            SET end_time = $3, end_latitude = $4, end_longitude = $5,
                total_distance_km = $6, max_speed = $7, status = $8
            WHERE id = $1 AND tenant_id = $2
            "#,
        )
        .bind(trip.trip_id)
        .bind(trip.tenant_id.clone())
        .bind(trip.end_time)
        .bind(trip.end_location.map(|p| p.latitude))
        .bind(trip.end_location.map(|p| p.longitude))
        .bind(trip.total_distance_km)
        .bind(trip.max_speed)
        .bind(trip.status.as_str())
    }

    fn alert_query(alert: &Alert) -> PgQuery {
        sqlx::query(
            r#"
            INSERT INTO alerts (id, tenant_id, vehicle_id, kind, severity, geofence_id, message,
                latitude, longitude, timestamp, acknowledged)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(alert.id)
        .bind(alert.tenant_id.clone())
        .bind(alert.vehicle_id.clone())
        .bind(alert.kind.as_str())
        .bind(alert.severity.as_str())
        .bind(alert.geofence_id)
        .bind(alert.message.clone())
        .bind(alert.location.latitude)
        .bind(alert.location.longitude)
        .bind(alert.timestamp)
        .bind(alert.acknowledged)
    }

    fn trip_change_query(change: &TripChange) -> PgQuery {
        match change {
            TripChange::Started(trip) => Self::insert_trip_query(trip),
            TripChange::Updated(trip) | TripChange::Closed(trip) => Self::update_trip_query(trip),
        }
    }
}

#[async_trait]
impl FleetRepository for PgFleetRepository {
    async fn insert_telemetry(&self, tenant_id: &str, reading: &TelemetryReading) -> AppResult<()> {
        Self::telemetry_query(tenant_id, reading).execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_trip(&self, trip: &Trip) -> AppResult<()> {
        Self::insert_trip_query(trip).execute(&self.pool).await?;
        Ok(())
    }

    async fn update_trip(&self, trip: &Trip) -> AppResult<()> {
        let result = Self::update_trip_query(trip).execute(&self.pool).await?;
        if result.rows_affected() == 0 {
            return Err(not_found_error("Trip", &trip.trip_id.to_string()));
        }
        Ok(())
    }

    async fn insert_alert(&self, alert: &Alert) -> AppResult<()> {
        Self::alert_query(alert).execute(&self.pool).await?;
        Ok(())
    }

    async fn acknowledge_alert(&self, tenant_id: &str, alert_id: Uuid) -> AppResult<Alert> {
        let row = sqlx::query_as::<_, AlertRow>(
            r#"
            UPDATE alerts SET acknowledged = TRUE
            WHERE id = $1 AND tenant_id = $2
            RETURNING id, tenant_id, vehicle_id, kind, severity, geofence_id, message,
                latitude, longitude, timestamp, acknowledged
            "#,
        )
        .bind(alert_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.and_then(AlertRow::into_alert)
            .ok_or_else(|| not_found_error("Alert", &alert_id.to_string()))
    }

    async fn list_geofences(&self, tenant_id: &str) -> AppResult<Vec<Geofence>> {
        let rows = sqlx::query_as::<_, GeofenceRow>(
            r#"
            SELECT id, tenant_id, name, polygon, alert_on_entry, alert_on_exit, is_active
            FROM geofences
            WHERE tenant_id = $1 AND is_active = TRUE
            "#,
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Geofence::from).collect())
    }

    async fn insert_optimized_route(&self, route: &OptimizedRoute) -> AppResult<()> {
        let fuel_cost = Decimal::from_f64_retain(route.estimated_fuel_cost)
            .unwrap_or_default()
            .round_dp(2);

        sqlx::query(
            r#"
            INSERT INTO optimized_routes (id, route_id, tenant_id, vehicle_type, waypoints,
                total_distance_km, estimated_duration_min, estimated_fuel_cost,
                optimization_score, alternative_routes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&route.route_id)
        .bind(&route.tenant_id)
        .bind(route.vehicle_type.as_str())
        .bind(Json(&route.waypoints))
        .bind(route.total_distance_km)
        .bind(route.estimated_duration_min)
        .bind(fuel_cost)
        .bind(route.optimization_score)
        .bind(Json(&route.alternative_routes))
        .bind(route.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn load_vehicle_state(&self, tenant_id: &str, vehicle_id: &str) -> AppResult<VehicleSnapshot> {
        let trip = sqlx::query_as::<_, TripRow>(
            r#"
            SELECT id, tenant_id, vehicle_id, start_time, end_time, start_latitude, start_longitude,
                end_latitude, end_longitude, total_distance_km, max_speed, status
            FROM trips
            WHERE tenant_id = $1 AND vehicle_id = $2 AND end_time IS NULL
            ORDER BY start_time DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(vehicle_id)
        .fetch_optional(&self.pool)
        .await?;

        let last = sqlx::query_as::<_, LastReadingRow>(
            r#"
            SELECT latitude, longitude, recorded_at
            FROM telemetry_readings
            WHERE tenant_id = $1 AND vehicle_id = $2
            ORDER BY recorded_at DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .bind(vehicle_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(VehicleSnapshot {
            active_trip: trip.map(Trip::from),
            last_position: last.as_ref().map(|row| GeoPoint::new(row.latitude, row.longitude)),
            last_timestamp: last.map(|row| row.recorded_at),
        })
    }

    async fn persist_reading(
        &self,
        tenant_id: &str,
        reading: &TelemetryReading,
        alerts: &[Alert],
        trip_change: Option<&TripChange>,
    ) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        Self::telemetry_query(tenant_id, reading).execute(&mut *tx).await?;
        for alert in alerts {
            Self::alert_query(alert).execute(&mut *tx).await?;
        }
        if let Some(change) = trip_change {
            Self::trip_change_query(change).execute(&mut *tx).await?;
        }

        tx.commit().await?;
        Ok(())
    }
}
