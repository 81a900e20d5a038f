// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shape fields -> canonical geometry.
//!
//! Circles become a GeoJSON Point at the center (the radius stays a separate
//! field). Polygons and rectangles become a single closed `[lon, lat]` ring.

use crate::models::coordinate::{Coordinate, ShapeKind};
use crate::models::geofence::CanonicalGeometry;

const MIN_POLYGON_VERTICES: usize = 3;
const MIN_RECTANGLE_VERTICES: usize = 2;

/// The shape-defining fields of a geofence, borrowed.
#[derive(Debug, Clone, Copy)]
pub struct ShapeFields<'a> {
    pub kind: ShapeKind,
    pub vertices: &'a [Coordinate],
    pub center: Option<Coordinate>,
    pub radius: Option<f64>,
}

/// Shape fields are insufficient for the declared kind.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("{kind} requires at least {required} coordinates, got {found}")]
    TooFewVertices {
        kind: ShapeKind,
        required: usize,
        found: usize,
    },

    #[error("circle requires a center")]
    MissingCenter,

    #[error("circle requires a radius")]
    MissingRadius,

    #[error("radius must be a positive number of meters, got {0}")]
    InvalidRadius(f64),

    #[error("coordinate out of range: lat {lat}, lng {lng}")]
    CoordinateOutOfRange { lat: f64, lng: f64 },
}

/// Derive the canonical geometry for a shape.
///
/// Never returns an empty geometry: insufficient input is an error and the
/// caller keeps whatever geometry it had before.
pub fn normalize(shape: &ShapeFields<'_>) -> Result<CanonicalGeometry, GeometryError> {
    match shape.kind {
        ShapeKind::Circle => {
            let center = shape.center.ok_or(GeometryError::MissingCenter)?;
            check_range(&center)?;
            let radius = shape.radius.ok_or(GeometryError::MissingRadius)?;
            if !radius.is_finite() || radius <= 0.0 {
                return Err(GeometryError::InvalidRadius(radius));
            }
            Ok(CanonicalGeometry::Point {
                lon: center.lng,
                lat: center.lat,
            })
        }
        ShapeKind::Polygon => closed_ring(shape.kind, shape.vertices, MIN_POLYGON_VERTICES),
        // Corners arrive already expanded by the client, in winding order.
        ShapeKind::Rectangle => closed_ring(shape.kind, shape.vertices, MIN_RECTANGLE_VERTICES),
    }
}

fn closed_ring(
    kind: ShapeKind,
    vertices: &[Coordinate],
    required: usize,
) -> Result<CanonicalGeometry, GeometryError> {
    if vertices.len() < required {
        return Err(GeometryError::TooFewVertices {
            kind,
            required,
            found: vertices.len(),
        });
    }

    let mut ring = Vec::with_capacity(vertices.len() + 1);
    for vertex in vertices {
        check_range(vertex)?;
        ring.push(vertex.to_position());
    }
    close_ring(&mut ring);

    Ok(CanonicalGeometry::Polygon { ring })
}

/// Append a copy of the first position if the ring is open.
pub fn close_ring(ring: &mut Vec<[f64; 2]>) {
    if let (Some(first), Some(last)) = (ring.first().copied(), ring.last()) {
        if first != *last {
            ring.push(first);
        }
    }
}

fn check_range(c: &Coordinate) -> Result<(), GeometryError> {
    if c.in_range() {
        Ok(())
    } else {
        Err(GeometryError::CoordinateOutOfRange {
            lat: c.lat,
            lng: c.lng,
        })
    }
}
