// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geofence-Tracker: store geofences and answer "which zones contain this point"
//!
//! This crate provides the backend API for managing polygon, rectangle and
//! circle geofences per user, with GeoJSON import and export.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;

use config::Config;
use db::MemoryDb;
use services::GeofenceService;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: MemoryDb,
    pub geofence_service: GeofenceService,
}

impl AppState {
    /// Wire the store and service together from configuration.
    pub fn new(config: Config) -> Self {
        let db = MemoryDb::new();
        let geofence_service = GeofenceService::new(db.clone(), config.max_geofences_per_user);
        Self {
            config,
            db,
            geofence_service,
        }
    }
}
