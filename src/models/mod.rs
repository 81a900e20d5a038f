// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Data models for the application.

pub mod coordinate;
pub mod geofence;

pub use coordinate::{Coordinate, ShapeKind};
pub use geofence::{CanonicalGeometry, Geofence, GeofenceUpdate, NewGeofence, Style};
