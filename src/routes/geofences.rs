// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geofence API routes for authenticated users.

use crate::db::{GeofenceQuery, GeofenceQueryCursor};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Coordinate, Geofence, GeofenceUpdate, NewGeofence};
use crate::services::geojson_io::SkippedFeature;
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;

const MAX_PER_PAGE: u32 = 100;
const MAX_TAG_FILTER_LEN: usize = 50;
const CURSOR_PARTS: usize = 3;

/// Geofence routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/geofences", get(list_geofences).post(create_geofence))
        .route("/api/geofences/check", post(check_point))
        .route("/api/geofences/export", get(export_geofences))
        .route("/api/geofences/import", post(import_geofences))
        .route(
            "/api/geofences/{id}",
            get(get_geofence)
                .put(update_geofence)
                .delete(delete_geofence),
        )
}

// ─── Listing ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct ListQuery {
    /// Only geofences carrying this tag
    tag: Option<String>,
    /// Cursor for forward pagination (opaque token)
    cursor: Option<String>,
    #[serde(default = "default_per_page")]
    per_page: u32,
    /// Include logically deleted geofences
    #[serde(default)]
    include_inactive: bool,
}

fn default_per_page() -> u32 {
    50
}

fn parse_cursor(cursor: Option<&str>) -> Result<Option<GeofenceQueryCursor>> {
    cursor
        .map(|raw| {
            let invalid_cursor = || AppError::BadRequest("Invalid 'cursor' parameter".to_string());

            let decoded = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid_cursor())?;
            let decoded_str = std::str::from_utf8(&decoded).map_err(|_| invalid_cursor())?;

            let parts: Vec<&str> = decoded_str.split(':').collect();
            if parts.len() != CURSOR_PARTS {
                return Err(invalid_cursor());
            }

            let seconds = parts[0].parse::<i64>().map_err(|_| invalid_cursor())?;
            let nanos = parts[1].parse::<u32>().map_err(|_| invalid_cursor())?;
            let id = parts[2].parse::<Uuid>().map_err(|_| invalid_cursor())?;
            let created_at =
                chrono::DateTime::from_timestamp(seconds, nanos).ok_or_else(invalid_cursor)?;

            Ok(GeofenceQueryCursor { created_at, id })
        })
        .transpose()
}

fn encode_cursor(cursor: GeofenceQueryCursor) -> String {
    let payload = format!(
        "{}:{}:{}",
        cursor.created_at.timestamp(),
        cursor.created_at.timestamp_subsec_nanos(),
        cursor.id
    );
    URL_SAFE_NO_PAD.encode(payload)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct GeofenceListResponse {
    pub geofences: Vec<Geofence>,
    pub per_page: u32,
    pub next_cursor: Option<String>,
}

/// List the caller's geofences, newest first.
async fn list_geofences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Query(params): Query<ListQuery>,
) -> Result<Json<GeofenceListResponse>> {
    tracing::debug!(
        user_id = %user.user_id,
        tag = ?params.tag,
        cursor = ?params.cursor,
        per_page = params.per_page,
        "Listing geofences"
    );

    if params.per_page == 0 {
        return Err(AppError::BadRequest(
            "per_page must be greater than 0".to_string(),
        ));
    }
    if params
        .tag
        .as_ref()
        .is_some_and(|t| t.chars().count() > MAX_TAG_FILTER_LEN)
    {
        return Err(AppError::BadRequest("Tag filter too long".to_string()));
    }

    let limit = params.per_page.min(MAX_PER_PAGE);
    let cursor = parse_cursor(params.cursor.as_deref())?;

    // Fetch one extra item to determine if another page is available.
    let query = GeofenceQuery {
        tag: params.tag,
        include_inactive: params.include_inactive,
        cursor,
        limit: limit.saturating_add(1),
    };
    let mut geofences = state.geofence_service.list(&user, &query).await?;

    let has_more = geofences.len() > limit as usize;
    if has_more {
        geofences.truncate(limit as usize);
    }
    let next_cursor = if has_more {
        geofences
            .last()
            .map(|g| encode_cursor(GeofenceQueryCursor::of(g)))
    } else {
        None
    };

    Ok(Json(GeofenceListResponse {
        geofences,
        per_page: limit,
        next_cursor,
    }))
}

// ─── Single Geofence ─────────────────────────────────────────

async fn create_geofence(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(new): Json<NewGeofence>,
) -> Result<(StatusCode, Json<Geofence>)> {
    let geofence = state.geofence_service.create(&user, new).await?;
    Ok((StatusCode::CREATED, Json(geofence)))
}

async fn get_geofence(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<Geofence>> {
    Ok(Json(state.geofence_service.get(&user, id).await?))
}

async fn update_geofence(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
    Json(update): Json<GeofenceUpdate>,
) -> Result<Json<Geofence>> {
    Ok(Json(state.geofence_service.update(&user, id, update).await?))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct DeleteGeofenceResponse {
    pub success: bool,
    pub id: Uuid,
}

/// Logical delete: the geofence stops matching and disappears from listings.
async fn delete_geofence(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<Uuid>,
) -> Result<Json<DeleteGeofenceResponse>> {
    state.geofence_service.delete(&user, id).await?;
    Ok(Json(DeleteGeofenceResponse { success: true, id }))
}

// ─── Containment ─────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct CheckPointResponse {
    pub point: Coordinate,
    pub is_inside: bool,
    pub geofences: Vec<Geofence>,
    pub count: usize,
}

/// Which of the caller's active geofences contain a point.
async fn check_point(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(point): Json<Coordinate>,
) -> Result<Json<CheckPointResponse>> {
    let geofences = state.geofence_service.check_point(&user, point).await?;

    Ok(Json(CheckPointResponse {
        point,
        is_inside: !geofences.is_empty(),
        count: geofences.len(),
        geofences,
    }))
}

// ─── GeoJSON Interchange ─────────────────────────────────────

async fn export_geofences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<impl IntoResponse> {
    let collection = state.geofence_service.export(&user).await?;
    Ok((
        [(header::CONTENT_TYPE, "application/geo+json")],
        Json(collection),
    ))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResponse {
    pub imported: usize,
    pub skipped: Vec<SkippedFeature>,
    pub geofences: Vec<Geofence>,
}

/// Create geofences from a GeoJSON FeatureCollection body.
async fn import_geofences(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    body: String,
) -> Result<Json<ImportResponse>> {
    let report = state.geofence_service.import_json(&user, &body).await?;

    Ok(Json(ImportResponse {
        imported: report.imported.len(),
        skipped: report.skipped,
        geofences: report.imported,
    }))
}
