// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::body::Body;
use axum::http::{header, Request, Response};
use geofence_tracker::config::Config;
use geofence_tracker::middleware::auth::create_jwt;
use geofence_tracker::middleware::Role;
use geofence_tracker::routes::create_router;
use geofence_tracker::AppState;
use serde_json::Value;
use std::sync::Arc;

/// Create a test app backed by a fresh in-memory store.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (axum::Router, Arc<AppState>) {
    create_test_app_with_config(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with_config(config: Config) -> (axum::Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(config));
    (create_router(state.clone()), state)
}

/// Create a session token for a regular user.
#[allow(dead_code)]
pub fn create_test_jwt(user_id: &str, signing_key: &[u8]) -> String {
    create_jwt(user_id, Role::User, signing_key).expect("Failed to create JWT")
}

#[allow(dead_code)]
pub fn create_admin_jwt(user_id: &str, signing_key: &[u8]) -> String {
    create_jwt(user_id, Role::Admin, signing_key).expect("Failed to create JWT")
}

/// Build an authenticated request, with a JSON body when one is given.
#[allow(dead_code)]
pub fn authed_request(method: &str, uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token));

    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Read a response body as JSON.
#[allow(dead_code)]
pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}

/// A 10x10 degree square with its south-west corner at the origin.
#[allow(dead_code)]
pub fn square_body(name: &str) -> Value {
    serde_json::json!({
        "name": name,
        "type": "polygon",
        "coordinates": [
            {"lat": 0.0, "lng": 0.0},
            {"lat": 0.0, "lng": 10.0},
            {"lat": 10.0, "lng": 10.0},
            {"lat": 10.0, "lng": 0.0}
        ]
    })
}
