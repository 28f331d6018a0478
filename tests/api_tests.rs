use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use std::sync::Arc;

use fleet_tracker::config::EnvironmentConfig;
use fleet_tracker::metrics::Metrics;
use fleet_tracker::models::{FEATURE_COUNT, OUTPUT_COUNT};
use fleet_tracker::services::RegressionModel;
use fleet_tracker::{create_router, AppState, Collaborators};

fn create_test_app() -> (Router, AppState) {
    let state = AppState::in_memory(EnvironmentConfig::default()).unwrap();
    (create_router(state.clone()), state)
}

fn post_json(uri: &str, tenant: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(tenant) = tenant {
        builder = builder.header("x-tenant-id", tenant);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn reading(vehicle_id: &str, latitude: f64) -> Value {
    json!({
        "vehicle_id": vehicle_id,
        "device_id": "DEV-1",
        "latitude": latitude,
        "longitude": 2.35,
        "speed": 38.0,
        "ignition_on": true,
        "battery_percent": 80.0,
        "timestamp": "2025-03-10T08:00:00Z"
    })
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = create_test_app();
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model_loaded"], false);
    assert!(body.get("redis_connected").is_none() || body["redis_connected"].is_null());
}

struct FixedModel;

impl RegressionModel for FixedModel {
    fn predict(&self, _features: &[f64; FEATURE_COUNT]) -> [f64; OUTPUT_COUNT] {
        [60.0, 8.0, 0.9]
    }
}

#[tokio::test]
async fn test_health_reports_loaded_model() {
    let mut collaborators = Collaborators::in_memory();
    collaborators.model = Some(Arc::new(FixedModel));
    let state = AppState::new(EnvironmentConfig::default(), collaborators, Metrics::new().unwrap());
    assert!(state.optimizer.has_model());

    let response = create_router(state)
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let body = body_json(response).await;
    assert_eq!(body["model_loaded"], true);
}

#[tokio::test]
async fn test_telemetry_is_accepted_and_queued() {
    let (app, state) = create_test_app();
    let response = app
        .oneshot(post_json("/api/telemetry", Some("acme"), reading("VAN-01", 48.85)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["tenant_id"], "acme");
    assert_eq!(body["data"]["accepted"], 1);
    assert_eq!(state.queue.pending("acme").await.unwrap(), 1);
}

#[tokio::test]
async fn test_telemetry_without_tenant_header_is_rejected() {
    let (app, state) = create_test_app();
    let response = app
        .oneshot(post_json("/api/telemetry", None, reading("VAN-01", 48.85)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.queue.pending("acme").await.unwrap(), 0);
}

#[tokio::test]
async fn test_out_of_range_latitude_is_rejected() {
    let (app, state) = create_test_app();
    let response = app
        .oneshot(post_json("/api/telemetry", Some("acme"), reading("VAN-01", 91.0)))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.queue.pending("acme").await.unwrap(), 0);
}

#[tokio::test]
async fn test_batch_with_one_invalid_reading_enqueues_nothing() {
    let (app, state) = create_test_app();
    let batch = json!({ "readings": [reading("VAN-01", 48.85), reading("VAN-02", -95.0)] });
    let response = app
        .oneshot(post_json("/api/telemetry/batch", Some("acme"), batch))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(state.queue.pending("acme").await.unwrap(), 0);
}

#[tokio::test]
async fn test_batch_is_accepted() {
    let (app, state) = create_test_app();
    let batch = json!({ "readings": [reading("VAN-01", 48.85), reading("VAN-02", 48.86)] });
    let response = app
        .oneshot(post_json("/api/telemetry/batch", Some("acme"), batch))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let body = body_json(response).await;
    assert_eq!(body["data"]["accepted"], 2);
    assert_eq!(state.queue.pending("acme").await.unwrap(), 2);
}

#[tokio::test]
async fn test_vehicle_without_trip() {
    let (app, _) = create_test_app();
    let request = Request::builder()
        .uri("/api/vehicles/VAN-01/trip")
        .header("x-tenant-id", "acme")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["vehicle_id"], "VAN-01");
    assert!(body["active_trip"].is_null());
}

#[tokio::test]
async fn test_acknowledge_unknown_alert_is_not_found() {
    let (app, _) = create_test_app();
    let uri = format!("/api/alerts/{}/acknowledge", uuid::Uuid::new_v4());
    let response = app
        .oneshot(post_json(&uri, Some("acme"), json!({})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_optimize_route_without_stops() {
    let (app, _) = create_test_app();
    let request = json!({
        "route_id": "R-100",
        "origin": { "latitude": 48.85, "longitude": 2.35 },
        "destination": { "latitude": 48.90, "longitude": 2.40 },
        "departure_time": "2025-03-10T08:00:00Z"
    });
    let response = app
        .oneshot(post_json("/api/routes/optimize", Some("acme"), request))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let waypoints = body["data"]["waypoints"].as_array().unwrap();
    assert_eq!(waypoints.len(), 2);
    assert_eq!(waypoints[0]["kind"], "origin");
    assert_eq!(waypoints[1]["kind"], "destination");
    assert_eq!(body["data"]["prediction"]["source"], "fallback");
    assert_eq!(body["data"]["tenant_id"], "acme");
}

#[tokio::test]
async fn test_optimize_route_with_invalid_origin() {
    let (app, _) = create_test_app();
    let request = json!({
        "route_id": "R-100",
        "origin": { "latitude": 120.0, "longitude": 2.35 },
        "destination": { "latitude": 48.90, "longitude": 2.40 }
    });
    let response = app
        .oneshot(post_json("/api/routes/optimize", Some("acme"), request))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let (app, state) = create_test_app();
    state.metrics.readings_accepted.inc();

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("fleet_tracker_readings_accepted_total 1"));
}
