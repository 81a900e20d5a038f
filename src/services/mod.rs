// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod containment;
pub mod geofence;
pub mod geojson_io;
pub mod normalizer;

pub use containment::{contains, find_containing, haversine_distance, EARTH_RADIUS_METERS};
pub use geofence::{GeofenceService, ImportReport};
pub use normalizer::{normalize, GeometryError, ShapeFields};
