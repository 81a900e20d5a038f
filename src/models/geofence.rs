// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Geofence model, its canonical geometry and the create/update payloads.

use crate::models::coordinate::{Coordinate, ShapeKind};
use crate::services::normalizer::{self, GeometryError, ShapeFields};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use uuid::Uuid;
use validator::{Validate, ValidationError};

const MAX_TAG_LEN: usize = 50;

/// A named, owned region with a shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Geofence {
    pub id: Uuid,
    /// User id of the creator; never reassigned
    pub owner_id: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    /// Drawn vertices. For circles this holds just the center.
    #[serde(rename = "coordinates")]
    pub vertices: Vec<Coordinate>,
    pub center: Option<Coordinate>,
    /// Circle radius in meters
    pub radius: Option<f64>,
    /// Derived from the shape fields, see [`normalizer::normalize`]
    #[cfg_attr(feature = "binding-generation", ts(type = "GeoJSON.Geometry"))]
    pub geometry: CanonicalGeometry,
    pub style: Style,
    pub tags: Vec<String>,
    /// False once logically deleted
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Geofence {
    /// Build a new geofence from a validated create payload.
    pub fn create(
        id: Uuid,
        owner_id: &str,
        new: NewGeofence,
        now: DateTime<Utc>,
    ) -> Result<Self, GeometryError> {
        let geometry = normalizer::normalize(&ShapeFields {
            kind: new.kind,
            vertices: &new.coordinates,
            center: new.center,
            radius: new.radius,
        })?;

        let (vertices, center, radius) = canonical_shape_fields(
            new.kind,
            new.coordinates,
            new.center,
            new.radius,
        );

        Ok(Self {
            id,
            owner_id: owner_id.to_string(),
            name: new.name.trim().to_string(),
            description: clean_description(new.description),
            kind: new.kind,
            vertices,
            center,
            radius,
            geometry,
            style: new.style,
            tags: normalize_tags(new.tags),
            active: true,
            created_at: now,
            updated_at: now,
        })
    }

    /// Apply a partial update.
    ///
    /// Geometry is re-derived only when the update touches kind, vertices,
    /// center or radius. If re-derivation fails the geofence is left exactly
    /// as it was. Returns whether the geometry was re-derived.
    pub fn apply_update(
        &mut self,
        update: GeofenceUpdate,
        now: DateTime<Utc>,
    ) -> Result<bool, GeometryError> {
        let reshaped = if update.touches_shape() {
            let kind = update.kind.unwrap_or(self.kind);
            let vertices = update
                .coordinates
                .clone()
                .unwrap_or_else(|| self.vertices.clone());
            let center = update.center.or(self.center);
            let radius = update.radius.or(self.radius);

            let geometry = normalizer::normalize(&ShapeFields {
                kind,
                vertices: &vertices,
                center,
                radius,
            })?;
            Some((kind, vertices, center, radius, geometry))
        } else {
            None
        };

        let renormalized = reshaped.is_some();
        if let Some((kind, vertices, center, radius, geometry)) = reshaped {
            let (vertices, center, radius) =
                canonical_shape_fields(kind, vertices, center, radius);
            self.kind = kind;
            self.vertices = vertices;
            self.center = center;
            self.radius = radius;
            self.geometry = geometry;
        }

        if let Some(name) = update.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = update.description {
            self.description = clean_description(Some(description));
        }
        if let Some(style) = update.style {
            self.style = style;
        }
        if let Some(tags) = update.tags {
            self.tags = normalize_tags(tags);
        }
        self.updated_at = now;

        Ok(renormalized)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// Drop the fields that are not authoritative for `kind`.
///
/// Circles keep their center as a single-element vertex list.
fn canonical_shape_fields(
    kind: ShapeKind,
    vertices: Vec<Coordinate>,
    center: Option<Coordinate>,
    radius: Option<f64>,
) -> (Vec<Coordinate>, Option<Coordinate>, Option<f64>) {
    match (kind, center) {
        (ShapeKind::Circle, Some(c)) => (vec![c], Some(c), radius),
        (ShapeKind::Circle, None) => (vertices, None, radius),
        (ShapeKind::Polygon | ShapeKind::Rectangle, _) => (vertices, None, None),
    }
}

fn clean_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

/// Trim labels, drop empty ones and duplicates, keep first-seen order.
pub fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

/// GeoJSON-style geometry derived from a geofence's shape fields.
///
/// Serialized as a GeoJSON geometry object:
/// `{"type":"Point","coordinates":[lon,lat]}` or
/// `{"type":"Polygon","coordinates":[[[lon,lat],...]]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "geojson::Geometry", try_from = "geojson::Geometry")]
pub enum CanonicalGeometry {
    Point { lon: f64, lat: f64 },
    /// Single closed ring of `[lon, lat]` pairs
    Polygon { ring: Vec<[f64; 2]> },
}

impl CanonicalGeometry {
    pub fn is_point(&self) -> bool {
        matches!(self, CanonicalGeometry::Point { .. })
    }
}

impl From<CanonicalGeometry> for geojson::Geometry {
    fn from(geometry: CanonicalGeometry) -> Self {
        let value = match geometry {
            CanonicalGeometry::Point { lon, lat } => geojson::Value::Point(vec![lon, lat]),
            CanonicalGeometry::Polygon { ring } => {
                geojson::Value::Polygon(vec![ring.iter().map(|p| p.to_vec()).collect()])
            }
        };
        geojson::Geometry::new(value)
    }
}

/// Stored geometry that is not a Point or single-ring Polygon.
#[derive(Debug, thiserror::Error)]
#[error("Unsupported stored geometry: {0}")]
pub struct GeometryDecodeError(String);

impl TryFrom<geojson::Geometry> for CanonicalGeometry {
    type Error = GeometryDecodeError;

    fn try_from(geometry: geojson::Geometry) -> Result<Self, Self::Error> {
        match geometry.value {
            geojson::Value::Point(p) if p.len() >= 2 => Ok(CanonicalGeometry::Point {
                lon: p[0],
                lat: p[1],
            }),
            geojson::Value::Polygon(rings) if rings.len() == 1 => {
                let ring = rings[0]
                    .iter()
                    .map(|p| match p.as_slice() {
                        [lon, lat, ..] => Ok([*lon, *lat]),
                        _ => Err(GeometryDecodeError("short position".to_string())),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(CanonicalGeometry::Polygon { ring })
            }
            geojson::Value::Point(_) => Err(GeometryDecodeError("short Point".to_string())),
            geojson::Value::Polygon(_) => {
                Err(GeometryDecodeError("Polygon with holes".to_string()))
            }
            _ => Err(GeometryDecodeError("not a Point or Polygon".to_string())),
        }
    }
}

/// Cosmetic attributes. No containment semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct Style {
    #[validate(length(min = 1, max = 32))]
    pub stroke_color: String,
    #[validate(length(min = 1, max = 32))]
    pub fill_color: String,
    #[validate(range(min = 0.0, max = 1.0))]
    pub fill_opacity: f64,
    #[validate(range(min = 1.0, max = 10.0))]
    pub stroke_weight: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            stroke_color: "#3388ff".to_string(),
            fill_color: "#3388ff".to_string(),
            fill_opacity: 0.2,
            stroke_weight: 3.0,
        }
    }
}

/// Create payload.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewGeofence {
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    #[serde(default)]
    #[validate(nested)]
    pub coordinates: Vec<Coordinate>,
    #[serde(default)]
    #[validate(nested)]
    pub center: Option<Coordinate>,
    #[serde(default)]
    #[validate(range(exclusive_min = 0.0))]
    pub radius: Option<f64>,
    #[serde(default)]
    #[validate(nested)]
    pub style: Style,
    #[serde(default)]
    #[validate(length(max = 20), custom(function = "valid_tags"))]
    pub tags: Vec<String>,
}

/// Partial update payload. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceUpdate {
    #[validate(length(min = 1, max = 100), custom(function = "not_blank"))]
    pub name: Option<String>,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<ShapeKind>,
    #[validate(nested)]
    pub coordinates: Option<Vec<Coordinate>>,
    #[validate(nested)]
    pub center: Option<Coordinate>,
    #[validate(range(exclusive_min = 0.0))]
    pub radius: Option<f64>,
    #[validate(nested)]
    pub style: Option<Style>,
    #[validate(length(max = 20), custom(function = "valid_tags"))]
    pub tags: Option<Vec<String>>,
}

impl GeofenceUpdate {
    /// Whether any field that feeds the canonical geometry is present.
    pub fn touches_shape(&self) -> bool {
        self.kind.is_some()
            || self.coordinates.is_some()
            || self.center.is_some()
            || self.radius.is_some()
    }
}

fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }
    Ok(())
}

fn valid_tags(tags: &[String]) -> Result<(), ValidationError> {
    if tags.iter().any(|t| t.chars().count() > MAX_TAG_LEN) {
        return Err(ValidationError::new("tag_too_long"));
    }
    Ok(())
}
