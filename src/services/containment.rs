// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Point-in-geofence tests.
//!
//! Circles use the haversine distance on a spherical earth; polygons and
//! rectangles use even-odd ray casting over the raw vertex list. Malformed
//! shapes never contain anything.

use crate::models::coordinate::{Coordinate, ShapeKind};
use crate::models::geofence::{CanonicalGeometry, Geofence};

/// Mean earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Great-circle distance in meters.
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    // Rounding can push h just past 1 for antipodal points.
    let h = h.min(1.0);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

/// Even-odd ray casting with x = longitude and y = latitude.
///
/// Each vertex is paired with its predecessor (index 0 wraps to the last), so
/// an explicitly closed ring gives the same answer as an open one. Points
/// exactly on an edge may land on either side.
pub fn point_in_polygon(point: Coordinate, vertices: &[Coordinate]) -> bool {
    if vertices.len() < 3 {
        return false;
    }

    let (x, y) = (point.lng, point.lat);
    let mut inside = false;
    let mut j = vertices.len() - 1;
    for (i, vi) in vertices.iter().enumerate() {
        let vj = vertices[j];
        if (vi.lat > y) != (vj.lat > y) {
            let x_cross = (vj.lng - vi.lng) * (y - vi.lat) / (vj.lat - vi.lat) + vi.lng;
            if x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn circle_contains(center: Option<Coordinate>, radius: Option<f64>, point: Coordinate) -> bool {
    match (center, radius) {
        (Some(center), Some(radius)) => haversine_distance(point, center) <= radius,
        _ => false,
    }
}

/// Whether `point` lies inside `geofence`.
///
/// Looks only at the shape fields authoritative for the geofence's kind; the
/// `active` flag is the caller's concern.
pub fn contains(geofence: &Geofence, point: Coordinate) -> bool {
    match geofence.kind {
        ShapeKind::Circle => circle_contains(geofence.center, geofence.radius, point),
        ShapeKind::Polygon | ShapeKind::Rectangle => point_in_polygon(point, &geofence.vertices),
    }
}

/// Same decision as [`contains`], made from the canonical form.
///
/// `radius` is only consulted for Point geometries.
pub fn geometry_contains(geometry: &CanonicalGeometry, radius: Option<f64>, point: Coordinate) -> bool {
    match geometry {
        CanonicalGeometry::Point { lon, lat } => {
            circle_contains(Some(Coordinate::new(*lat, *lon)), radius, point)
        }
        CanonicalGeometry::Polygon { ring } => {
            let vertices: Vec<Coordinate> =
                ring.iter().copied().map(Coordinate::from_position).collect();
            point_in_polygon(point, &vertices)
        }
    }
}

/// The geofences containing `point`, in input order.
pub fn find_containing(geofences: &[Geofence], point: Coordinate) -> Vec<&Geofence> {
    geofences.iter().filter(|g| contains(g, point)).collect()
}
