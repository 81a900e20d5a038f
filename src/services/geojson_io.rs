// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! GeoJSON import and export of geofences.

use crate::models::coordinate::{Coordinate, ShapeKind};
use crate::models::geofence::{Geofence, NewGeofence, Style};
use chrono::SecondsFormat;
use geo::{Point, Polygon};
use geojson::{Feature, FeatureCollection, GeoJson, JsonObject};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Name given to imported features without a usable `name` property.
const UNNAMED: &str = "Unnamed";

/// A feature that could not be turned into a geofence.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedFeature {
    /// Position in the input collection
    pub index: usize,
    pub reason: String,
}

/// Geofence payloads parsed from a FeatureCollection.
#[derive(Debug, Default)]
pub struct ParsedCollection {
    /// `(feature index, payload)` pairs
    pub geofences: Vec<(usize, NewGeofence)>,
    pub skipped: Vec<SkippedFeature>,
}

/// Load geofence payloads from a GeoJSON file.
pub fn read_feature_collection<P: AsRef<Path>>(path: P) -> Result<ParsedCollection, GeoJsonError> {
    let json_data =
        fs::read_to_string(path.as_ref()).map_err(|e| GeoJsonError::IoError(e.to_string()))?;
    parse_feature_collection(&json_data)
}

/// Parse a GeoJSON FeatureCollection into geofence payloads.
///
/// Polygons become polygon geofences (or rectangles when the feature's `type`
/// property says so). Points become circles when they carry a numeric
/// `radius` property. Anything else is skipped. Payloads are not validated
/// here; they go through the normal create path.
pub fn parse_feature_collection(json_data: &str) -> Result<ParsedCollection, GeoJsonError> {
    let geojson: GeoJson = json_data
        .parse()
        .map_err(|e: geojson::Error| GeoJsonError::ParseError(e.to_string()))?;

    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(GeoJsonError::NotFeatureCollection);
    };

    let mut parsed = ParsedCollection::default();
    for (index, feature) in collection.features.into_iter().enumerate() {
        match feature_to_new_geofence(feature) {
            Ok(new) => parsed.geofences.push((index, new)),
            Err(reason) => {
                tracing::warn!(index, reason = %reason, "Skipping GeoJSON feature");
                parsed.skipped.push(SkippedFeature { index, reason });
            }
        }
    }

    tracing::info!(
        parsed = parsed.geofences.len(),
        skipped = parsed.skipped.len(),
        "Parsed GeoJSON feature collection"
    );
    Ok(parsed)
}

fn feature_to_new_geofence(feature: Feature) -> Result<NewGeofence, String> {
    let name = feature
        .property("name")
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(UNNAMED)
        .to_string();
    let description = feature
        .property("description")
        .and_then(|v| v.as_str())
        .map(String::from);
    let tags = feature
        .property("tags")
        .and_then(|v| v.as_array())
        .map(|tags| {
            tags.iter()
                .filter_map(|t| t.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default();
    let style = feature
        .property("style")
        .and_then(|v| serde_json::from_value::<Style>(v.clone()).ok())
        .unwrap_or_default();
    let declared_kind = feature
        .property("type")
        .and_then(|v| serde_json::from_value::<ShapeKind>(v.clone()).ok());
    let radius = feature.property("radius").and_then(|v| v.as_f64());

    let geometry = feature.geometry.ok_or_else(|| "feature has no geometry".to_string())?;

    let mut new = NewGeofence {
        name,
        description,
        kind: ShapeKind::Polygon,
        coordinates: vec![],
        center: None,
        radius: None,
        style,
        tags,
    };

    match geometry.value {
        value @ geojson::Value::Polygon(_) => {
            let polygon: Polygon<f64> = value.try_into().map_err(|e: geojson::Error| e.to_string())?;
            if !polygon.interiors().is_empty() {
                tracing::debug!(name = %new.name, "Ignoring polygon holes on import");
            }
            let mut vertices: Vec<Coordinate> = polygon
                .exterior()
                .coords()
                .map(|c| Coordinate::new(c.y, c.x))
                .collect();
            // Stored vertices are the drawn corners; the ring is closed again on normalize.
            if vertices.len() > 1 && vertices.first() == vertices.last() {
                vertices.pop();
            }
            new.kind = match declared_kind {
                Some(ShapeKind::Rectangle) => ShapeKind::Rectangle,
                _ => ShapeKind::Polygon,
            };
            new.coordinates = vertices;
        }
        value @ geojson::Value::Point(_) => {
            let point: Point<f64> = value.try_into().map_err(|e: geojson::Error| e.to_string())?;
            let radius = radius.ok_or_else(|| "point feature without radius".to_string())?;
            let center = Coordinate::new(point.y(), point.x());
            new.kind = ShapeKind::Circle;
            new.center = Some(center);
            new.radius = Some(radius);
            new.coordinates = vec![center];
        }
        other => {
            let kind = match other {
                geojson::Value::LineString(_) | geojson::Value::MultiLineString(_) => "line",
                geojson::Value::MultiPoint(_) => "multipoint",
                geojson::Value::MultiPolygon(_) => "multipolygon",
                _ => "geometry collection",
            };
            return Err(format!("unsupported geometry type: {}", kind));
        }
    }

    Ok(new)
}

/// One geofence as a GeoJSON Feature.
///
/// The feature's geometry is the canonical geometry; circle radius and the
/// other attributes travel as properties.
pub fn to_feature(geofence: &Geofence) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("name".to_string(), Value::from(geofence.name.clone()));
    if let Some(description) = &geofence.description {
        properties.insert("description".to_string(), Value::from(description.clone()));
    }
    properties.insert("type".to_string(), Value::from(geofence.kind.as_str()));
    if let Some(radius) = geofence.radius {
        properties.insert("radius".to_string(), Value::from(radius));
    }
    properties.insert("tags".to_string(), Value::from(geofence.tags.clone()));
    properties.insert(
        "style".to_string(),
        serde_json::to_value(&geofence.style).unwrap_or(Value::Null),
    );
    properties.insert(
        "updatedAt".to_string(),
        Value::from(
            geofence
                .updated_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
        ),
    );

    Feature {
        bbox: None,
        geometry: Some(geofence.geometry.clone().into()),
        id: Some(geojson::feature::Id::String(geofence.id.to_string())),
        properties: Some(properties),
        foreign_members: None,
    }
}

pub fn to_feature_collection(geofences: &[Geofence]) -> FeatureCollection {
    FeatureCollection {
        bbox: None,
        features: geofences.iter().map(to_feature).collect(),
        foreign_members: None,
    }
}

/// Errors from GeoJSON operations.
#[derive(Debug, thiserror::Error)]
pub enum GeoJsonError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse GeoJSON: {0}")]
    ParseError(String),

    #[error("Expected a GeoJSON FeatureCollection")]
    NotFeatureCollection,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "Park", "tags": ["green", 7]},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]]]}
            },
            {
                "type": "Feature",
                "properties": {"name": "Office", "radius": 250.0},
                "geometry": {"type": "Point", "coordinates": [-122.4194, 37.7749]}
            },
            {
                "type": "Feature",
                "properties": {"name": "Trail"},
                "geometry": {"type": "LineString", "coordinates": [[0,0],[1,1]]}
            },
            {
                "type": "Feature",
                "properties": {"name": "Pin"},
                "geometry": {"type": "Point", "coordinates": [1, 2]}
            },
            {
                "type": "Feature",
                "properties": {"type": "rectangle"},
                "geometry": {"type": "Polygon", "coordinates": [[[0,0],[5,0],[5,5],[0,5],[0,0]]]}
            }
        ]
    }"#;

    #[test]
    fn test_parse_feature_collection() {
        let parsed = parse_feature_collection(COLLECTION).unwrap();

        assert_eq!(parsed.geofences.len(), 3);
        let indexes: Vec<usize> = parsed.skipped.iter().map(|s| s.index).collect();
        assert_eq!(indexes, vec![2, 3]);

        let (_, park) = &parsed.geofences[0];
        assert_eq!(park.kind, ShapeKind::Polygon);
        assert_eq!(park.coordinates.len(), 4);
        assert_eq!(park.coordinates[1], Coordinate::new(0.0, 10.0));
        assert_eq!(park.tags, vec!["green"]);

        let (_, office) = &parsed.geofences[1];
        assert_eq!(office.kind, ShapeKind::Circle);
        assert_eq!(office.center, Some(Coordinate::new(37.7749, -122.4194)));
        assert_eq!(office.radius, Some(250.0));

        let (index, rect) = &parsed.geofences[2];
        assert_eq!(*index, 4);
        assert_eq!(rect.kind, ShapeKind::Rectangle);
        assert_eq!(rect.name, UNNAMED);
    }

    #[test]
    fn test_parse_rejects_non_collection() {
        let err = parse_feature_collection(r#"{"type": "Point", "coordinates": [0, 0]}"#)
            .unwrap_err();
        assert!(matches!(err, GeoJsonError::NotFeatureCollection));

        let err = parse_feature_collection("not json").unwrap_err();
        assert!(matches!(err, GeoJsonError::ParseError(_)));
    }

    #[test]
    fn test_export_then_import_keeps_shape() {
        let new = NewGeofence {
            name: "Round".to_string(),
            description: Some("A circle".to_string()),
            kind: ShapeKind::Circle,
            coordinates: vec![],
            center: Some(Coordinate::new(10.0, 20.0)),
            radius: Some(42.0),
            style: Style::default(),
            tags: vec!["a".to_string()],
        };
        let g = Geofence::create(Uuid::new_v4(), "owner", new, Utc::now()).unwrap();

        let collection = to_feature_collection(std::slice::from_ref(&g));
        let json = GeoJson::FeatureCollection(collection).to_string();
        let parsed = parse_feature_collection(&json).unwrap();

        assert!(parsed.skipped.is_empty());
        let (_, back) = &parsed.geofences[0];
        assert_eq!(back.name, "Round");
        assert_eq!(back.description.as_deref(), Some("A circle"));
        assert_eq!(back.kind, ShapeKind::Circle);
        assert_eq!(back.center, g.center);
        assert_eq!(back.radius, Some(42.0));
        assert_eq!(back.tags, g.tags);
    }
}
