// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geofence write path and containment queries.
//!
//! Every write goes through validation and the normalizer before it reaches
//! the store, so a stored geofence always carries geometry that matches its
//! shape fields.

use crate::db::{GeofenceQuery, MemoryDb};
use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Coordinate, Geofence, GeofenceUpdate, NewGeofence};
use crate::services::containment;
use crate::services::geojson_io::{self, ParsedCollection, SkippedFeature};
use chrono::Utc;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;
use validator::Validate;

/// Outcome of a GeoJSON import.
#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: Vec<Geofence>,
    pub skipped: Vec<SkippedFeature>,
}

/// Per-owner locks serializing the quota check with the insert.
type OwnerLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

fn not_found(id: Uuid) -> AppError {
    AppError::NotFound(format!("Geofence {} not found", id))
}

/// Service for creating, editing and querying geofences.
#[derive(Clone)]
pub struct GeofenceService {
    db: MemoryDb,
    max_per_owner: usize,
    owner_locks: OwnerLocks,
}

impl GeofenceService {
    pub fn new(db: MemoryDb, max_per_owner: usize) -> Self {
        Self {
            db,
            max_per_owner,
            owner_locks: Arc::new(DashMap::new()),
        }
    }

    /// Validate, normalize and store a new geofence owned by `user`.
    pub async fn create(&self, user: &AuthUser, new: NewGeofence) -> Result<Geofence> {
        new.validate()?;

        let lock = self
            .owner_locks
            .entry(user.user_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        let owned = self.db.count_active_for_owner(&user.user_id).await?;
        if owned >= self.max_per_owner {
            return Err(AppError::Conflict(format!(
                "Geofence limit of {} reached",
                self.max_per_owner
            )));
        }

        let geofence = Geofence::create(Uuid::new_v4(), &user.user_id, new, Utc::now())?;
        self.db.insert_geofence(&geofence).await?;

        tracing::info!(
            user_id = %user.user_id,
            geofence_id = %geofence.id,
            kind = %geofence.kind,
            "Created geofence"
        );
        Ok(geofence)
    }

    /// Fetch an active geofence the user may see.
    ///
    /// Geofences of other owners look missing rather than forbidden.
    pub async fn get(&self, user: &AuthUser, id: Uuid) -> Result<Geofence> {
        self.db
            .get_geofence(id)
            .await?
            .filter(|g| g.active && user.can_access(g))
            .ok_or_else(|| not_found(id))
    }

    /// Apply a partial update. Shape changes re-derive the geometry; an
    /// invalid shape rejects the whole update.
    pub async fn update(&self, user: &AuthUser, id: Uuid, update: GeofenceUpdate) -> Result<Geofence> {
        update.validate()?;

        let now = Utc::now();
        let (geofence, renormalized) = self
            .db
            .update_geofence(id, |g| {
                if !g.active || !user.can_access(g) {
                    return Err(not_found(id));
                }
                let renormalized = g.apply_update(update, now)?;
                Ok((g.clone(), renormalized))
            })
            .await?;

        tracing::info!(
            user_id = %user.user_id,
            geofence_id = %id,
            renormalized,
            "Updated geofence"
        );
        Ok(geofence)
    }

    /// Logically delete a geofence. Deleting twice is a no-op for the owner.
    pub async fn delete(&self, user: &AuthUser, id: Uuid) -> Result<()> {
        let now = Utc::now();
        let deleted = self
            .db
            .update_geofence(id, |g| {
                if !user.can_access(g) {
                    return Err(not_found(id));
                }
                if !g.active {
                    return Ok(false);
                }
                g.active = false;
                g.updated_at = now;
                Ok(true)
            })
            .await?;

        if deleted {
            tracing::info!(user_id = %user.user_id, geofence_id = %id, "Deleted geofence");
        } else {
            tracing::debug!(geofence_id = %id, "Geofence already deleted");
        }
        Ok(())
    }

    /// List the user's own geofences.
    pub async fn list(&self, user: &AuthUser, query: &GeofenceQuery) -> Result<Vec<Geofence>> {
        self.db.list_geofences_for_owner(&user.user_id, query).await
    }

    /// The user's active geofences containing `point`, newest first.
    pub async fn check_point(&self, user: &AuthUser, point: Coordinate) -> Result<Vec<Geofence>> {
        if !point.in_range() {
            return Err(AppError::BadRequest(format!(
                "Point out of range: lat {}, lng {}",
                point.lat, point.lng
            )));
        }

        let geofences = self.db.active_geofences_for_owner(&user.user_id).await?;
        let matches: Vec<Geofence> = containment::find_containing(&geofences, point)
            .into_iter()
            .cloned()
            .collect();

        tracing::debug!(
            user_id = %user.user_id,
            lat = point.lat,
            lng = point.lng,
            evaluated = geofences.len(),
            matched = matches.len(),
            "Checked point against geofences"
        );
        Ok(matches)
    }

    /// The user's active geofences as a GeoJSON FeatureCollection.
    pub async fn export(&self, user: &AuthUser) -> Result<geojson::FeatureCollection> {
        let geofences = self.db.active_geofences_for_owner(&user.user_id).await?;
        Ok(geojson_io::to_feature_collection(&geofences))
    }

    /// Create geofences from a GeoJSON FeatureCollection.
    ///
    /// Features that cannot be parsed or fail validation are reported as
    /// skipped; the rest are created.
    pub async fn import_json(&self, user: &AuthUser, json_data: &str) -> Result<ImportReport> {
        let parsed = geojson_io::parse_feature_collection(json_data)
            .map_err(|e| AppError::BadRequest(e.to_string()))?;
        self.import_parsed(user, parsed).await
    }

    /// Create geofences from a GeoJSON file on disk.
    pub async fn import_file<P: AsRef<Path>>(&self, user: &AuthUser, path: P) -> Result<ImportReport> {
        let parsed = geojson_io::read_feature_collection(path)
            .map_err(|e| AppError::Internal(anyhow::anyhow!(e)))?;
        self.import_parsed(user, parsed).await
    }

    async fn import_parsed(&self, user: &AuthUser, parsed: ParsedCollection) -> Result<ImportReport> {
        let mut report = ImportReport {
            imported: Vec::with_capacity(parsed.geofences.len()),
            skipped: parsed.skipped,
        };

        for (index, new) in parsed.geofences {
            match self.create(user, new).await {
                Ok(geofence) => report.imported.push(geofence),
                Err(e @ (AppError::BadRequest(_) | AppError::Validation(_) | AppError::Conflict(_))) => {
                    report.skipped.push(SkippedFeature {
                        index,
                        reason: e.to_string(),
                    });
                }
                Err(e) => return Err(e),
            }
        }
        report.skipped.sort_by_key(|s| s.index);

        tracing::info!(
            user_id = %user.user_id,
            imported = report.imported.len(),
            skipped = report.skipped.len(),
            "Imported geofences"
        );
        Ok(report)
    }
}
