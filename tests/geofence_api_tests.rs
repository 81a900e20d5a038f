// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geofence API tests.
//!
//! These tests drive the full router against the in-memory store and verify:
//! 1. Create/read/update/delete round trips through the API
//! 2. Invalid shapes are rejected without being stored
//! 3. Point checks only consider the caller's active geofences

use axum::http::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt;

mod common;

use common::{authed_request, json_body, square_body};

async fn create(app: &axum::Router, token: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(authed_request("POST", "/api/geofences", token, Some(body)))
        .await
        .unwrap();
    let status = response.status();
    (status, json_body(response).await)
}

#[tokio::test]
async fn test_create_and_get_polygon() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("alice", &state.config.jwt_signing_key);

    let (status, created) = create(&app, &token, square_body("Home")).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["name"], "Home");
    assert_eq!(created["type"], "polygon");
    assert_eq!(created["ownerId"], "alice");
    assert_eq!(created["active"], true);
    assert_eq!(created["style"]["strokeColor"], "#3388ff");
    assert_eq!(created["style"]["fillColor"], "#3388ff");
    assert_eq!(created["style"]["fillOpacity"], 0.2);
    assert_eq!(created["style"]["strokeWeight"], 3.0);

    // Stored geometry is a closed GeoJSON ring in [lng, lat] order
    assert_eq!(created["geometry"]["type"], "Polygon");
    let ring = created["geometry"]["coordinates"][0].as_array().unwrap();
    assert_eq!(ring.len(), 5);
    assert_eq!(ring[0], ring[4]);
    assert_eq!(ring[1], json!([10.0, 0.0]));

    let id = created["id"].as_str().unwrap();
    let response = app
        .clone()
        .oneshot(authed_request("GET", &format!("/api/geofences/{}", id), &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, created);
}

#[tokio::test]
async fn test_two_point_polygon_is_rejected_and_not_stored() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("alice", &state.config.jwt_signing_key);

    let body = json!({
        "name": "Line",
        "type": "polygon",
        "coordinates": [{"lat": 0.0, "lng": 0.0}, {"lat": 1.0, "lng": 1.0}]
    });
    let (status, error) = create(&app, &token, body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(error["error"], "validation_error");

    let response = app
        .clone()
        .oneshot(authed_request("GET", "/api/geofences", &token, None))
        .await
        .unwrap();
    let listing = json_body(response).await;
    assert!(listing["geofences"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_circle_requires_radius() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("alice", &state.config.jwt_signing_key);

    let body = json!({
        "name": "Pin",
        "type": "circle",
        "center": {"lat": 37.7749, "lng": -122.4194}
    });
    let (status, _) = create(&app, &token, body).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_blank_name_is_bad_request() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("alice", &state.config.jwt_signing_key);

    let mut body = square_body("   ");
    let (status, error) = create(&app, &token, body.clone()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"], "bad_request");

    body["name"] = json!("x".repeat(101));
    let (status, _) = create(&app, &token, body).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_check_point_polygon_and_circle() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("alice", &state.config.jwt_signing_key);

    create(&app, &token, square_body("Square")).await;
    let circle = json!({
        "name": "Downtown",
        "type": "circle",
        "center": {"lat": 37.7749, "lng": -122.4194},
        "radius": 1000.0
    });
    let (status, _) = create(&app, &token, circle).await;
    assert_eq!(status, StatusCode::CREATED);

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/geofences/check",
            &token,
            Some(json!({"lat": 5.0, "lng": 5.0})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["isInside"], true);
    assert_eq!(body["count"], 1);
    assert_eq!(body["geofences"][0]["name"], "Square");
    assert_eq!(body["point"], json!({"lat": 5.0, "lng": 5.0}));

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/geofences/check",
            &token,
            Some(json!({"lat": 37.7750, "lng": -122.4195})),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["count"], 1);
    assert_eq!(body["geofences"][0]["name"], "Downtown");

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/geofences/check",
            &token,
            Some(json!({"lat": 15.0, "lng": 5.0})),
        ))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["isInside"], false);
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_check_point_out_of_range() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("alice", &state.config.jwt_signing_key);

    let response = app
        .oneshot(authed_request(
            "POST",
            "/api/geofences/check",
            &token,
            Some(json!({"lat": 95.0, "lng": 0.0})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_reshapes_geometry() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("alice", &state.config.jwt_signing_key);

    let (_, created) = create(&app, &token, square_body("Square")).await;
    let uri = format!("/api/geofences/{}", created["id"].as_str().unwrap());

    let update = json!({
        "type": "circle",
        "center": {"lat": 5.0, "lng": 5.0},
        "radius": 250.0,
        "tags": ["Work", "work", " office "]
    });
    let response = app
        .clone()
        .oneshot(authed_request("PUT", &uri, &token, Some(update)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let updated = json_body(response).await;
    assert_eq!(updated["type"], "circle");
    assert_eq!(updated["geometry"]["type"], "Point");
    assert_eq!(updated["geometry"]["coordinates"], json!([5.0, 5.0]));
    assert_eq!(updated["radius"], 250.0);
    assert_eq!(updated["name"], "Square");
    assert_eq!(updated["createdAt"], created["createdAt"]);

    // A shape change that fails normalization leaves the record untouched
    let response = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            &uri,
            &token,
            Some(json!({"type": "polygon", "coordinates": [{"lat": 1.0, "lng": 1.0}]})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let response = app
        .clone()
        .oneshot(authed_request("GET", &uri, &token, None))
        .await
        .unwrap();
    assert_eq!(json_body(response).await, updated);
}

#[tokio::test]
async fn test_delete_hides_geofence() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("alice", &state.config.jwt_signing_key);

    let (_, created) = create(&app, &token, square_body("Temporary")).await;
    let uri = format!("/api/geofences/{}", created["id"].as_str().unwrap());

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(authed_request("DELETE", &uri, &token, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["success"], true);
    }

    let response = app
        .clone()
        .oneshot(authed_request("GET", &uri, &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/geofences/check",
            &token,
            Some(json!({"lat": 5.0, "lng": 5.0})),
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["count"], 0);

    let response = app
        .clone()
        .oneshot(authed_request(
            "GET",
            "/api/geofences?include_inactive=true",
            &token,
            None,
        ))
        .await
        .unwrap();
    let listing = json_body(response).await;
    assert_eq!(listing["geofences"].as_array().unwrap().len(), 1);
    assert_eq!(listing["geofences"][0]["active"], false);
}

#[tokio::test]
async fn test_other_users_geofences_are_invisible() {
    let (app, state) = common::create_test_app();
    let key = &state.config.jwt_signing_key;
    let alice = common::create_test_jwt("alice", key);
    let bob = common::create_test_jwt("bob", key);

    let (_, created) = create(&app, &alice, square_body("Private")).await;
    let uri = format!("/api/geofences/{}", created["id"].as_str().unwrap());

    for method in ["GET", "DELETE"] {
        let response = app
            .clone()
            .oneshot(authed_request(method, &uri, &bob, None))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{} as bob", method);
    }

    let response = app
        .clone()
        .oneshot(authed_request(
            "PUT",
            &uri,
            &bob,
            Some(json!({"name": "Hijacked"})),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = app
        .clone()
        .oneshot(authed_request(
            "POST",
            "/api/geofences/check",
            &bob,
            Some(json!({"lat": 5.0, "lng": 5.0})),
        ))
        .await
        .unwrap();
    assert_eq!(json_body(response).await["count"], 0);

    // Admins can see it
    let admin = common::create_admin_jwt("root", key);
    let response = app
        .clone()
        .oneshot(authed_request("GET", &uri, &admin, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_invalid_id_is_rejected() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("alice", &state.config.jwt_signing_key);

    let response = app
        .oneshot(authed_request("GET", "/api/geofences/not-a-uuid", &token, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_quota_returns_conflict() {
    let mut config = geofence_tracker::config::Config::test_default();
    config.max_geofences_per_user = 1;
    let (app, state) = common::create_test_app_with_config(config);
    let token = common::create_test_jwt("alice", &state.config.jwt_signing_key);

    let (status, _) = create(&app, &token, square_body("First")).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, error) = create(&app, &token, square_body("Second")).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "conflict");
}
