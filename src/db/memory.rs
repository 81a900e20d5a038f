// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process geofence store.
//!
//! Provides typed operations for:
//! - Geofences (insert, fetch, in-place update)
//! - Owner listings filtered by tag with cursor pagination
//!
//! Records are never physically removed; deletion is a flag on the record.

use crate::error::AppError;
use crate::models::Geofence;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::cmp::Ordering;
use std::sync::Arc;
use uuid::Uuid;

/// Position in an owner listing (newest first, ties broken by id).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeofenceQueryCursor {
    pub created_at: DateTime<Utc>,
    pub id: Uuid,
}

impl GeofenceQueryCursor {
    pub fn of(geofence: &Geofence) -> Self {
        Self {
            created_at: geofence.created_at,
            id: geofence.id,
        }
    }
}

/// Filters for listing an owner's geofences.
#[derive(Debug, Clone, Default)]
pub struct GeofenceQuery {
    pub tag: Option<String>,
    pub include_inactive: bool,
    /// Return only records strictly after this position
    pub cursor: Option<GeofenceQueryCursor>,
    pub limit: u32,
}

/// Newest first; id descending as tie-breaker.
fn listing_order(a: &GeofenceQueryCursor, b: &GeofenceQueryCursor) -> Ordering {
    b.created_at
        .cmp(&a.created_at)
        .then_with(|| b.id.cmp(&a.id))
}

/// Geofence store shared across request handlers.
#[derive(Clone, Default)]
pub struct MemoryDb {
    geofences: Arc<DashMap<Uuid, Geofence>>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Geofence Operations ─────────────────────────────────────

    /// Store a new geofence. Fails if the id is already taken.
    pub async fn insert_geofence(&self, geofence: &Geofence) -> Result<(), AppError> {
        match self.geofences.entry(geofence.id) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(AppError::Database(format!(
                "Geofence {} already exists",
                geofence.id
            ))),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(geofence.clone());
                Ok(())
            }
        }
    }

    /// Get a geofence by id, active or not.
    pub async fn get_geofence(&self, id: Uuid) -> Result<Option<Geofence>, AppError> {
        Ok(self.geofences.get(&id).map(|g| g.value().clone()))
    }

    /// Read-modify-write a stored geofence under its entry lock.
    ///
    /// `f` sees the current record and may mutate it in place. It must leave
    /// the record untouched when it returns an error.
    pub async fn update_geofence<T, F>(&self, id: Uuid, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Geofence) -> Result<T, AppError>,
    {
        match self.geofences.get_mut(&id) {
            Some(mut stored) => f(stored.value_mut()),
            None => Err(AppError::NotFound(format!("Geofence {} not found", id))),
        }
    }

    /// List an owner's geofences, newest first.
    pub async fn list_geofences_for_owner(
        &self,
        owner_id: &str,
        query: &GeofenceQuery,
    ) -> Result<Vec<Geofence>, AppError> {
        let mut results: Vec<Geofence> = self
            .geofences
            .iter()
            .filter(|entry| {
                let g = entry.value();
                g.owner_id == owner_id
                    && (query.include_inactive || g.active)
                    && query.tag.as_deref().map_or(true, |tag| g.has_tag(tag))
            })
            .map(|entry| entry.value().clone())
            .collect();

        results.sort_by(|a, b| listing_order(&GeofenceQueryCursor::of(a), &GeofenceQueryCursor::of(b)));

        if let Some(cursor) = query.cursor {
            results.retain(|g| listing_order(&cursor, &GeofenceQueryCursor::of(g)) == Ordering::Less);
        }
        results.truncate(query.limit as usize);

        Ok(results)
    }

    /// All active geofences of an owner, newest first.
    pub async fn active_geofences_for_owner(
        &self,
        owner_id: &str,
    ) -> Result<Vec<Geofence>, AppError> {
        self.list_geofences_for_owner(
            owner_id,
            &GeofenceQuery {
                limit: u32::MAX,
                ..Default::default()
            },
        )
        .await
    }

    /// Number of records held, deleted ones included.
    pub fn stored_count(&self) -> usize {
        self.geofences.len()
    }

    /// Number of active geofences an owner has.
    pub async fn count_active_for_owner(&self, owner_id: &str) -> Result<usize, AppError> {
        Ok(self
            .geofences
            .iter()
            .filter(|entry| entry.value().owner_id == owner_id && entry.value().active)
            .count())
    }
}
