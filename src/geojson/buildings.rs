use std::collections::HashMap;

use geo::ChamberlainDuquetteArea;
use geojson::{Feature, FeatureCollection, Geometry, JsonObject, JsonValue};

use crate::types::{FetchError, OverpassResponse};

/// Extrusion used by the map viewer when a building has no height tags.
pub const DEFAULT_HEIGHT_M: f64 = 30.0;
const METERS_PER_LEVEL: f64 = 3.0;

/// Turns an Overpass building payload into a GeoJSON feature collection.
///
/// Ways reference nodes by id, so every node is indexed first. Node refs
/// that are missing from the payload are skipped; ways left with too few
/// points to draw are dropped.
pub fn buildings_to_geojson(payload: &serde_json::Value) -> Result<FeatureCollection, FetchError> {
    let response: OverpassResponse = serde_json::from_value(payload.clone())
        .map_err(|_| FetchError::transport("malformed response body"))?;

    let nodes: HashMap<i64, (f64, f64)> = response
        .elements
        .iter()
        .filter_map(|element| element.position().map(|pos| (element.id, pos)))
        .collect();

    let mut features = Vec::new();
    for way in response.elements.iter().filter(|e| e.is_building()) {
        let coords: Vec<geo::Coord> = way
            .nodes
            .iter()
            .filter_map(|id| nodes.get(id))
            .map(|&(x, y)| geo::Coord { x, y })
            .collect();

        let closed = coords.len() >= 4 && coords.first() == coords.last();
        let mut properties = JsonObject::new();
        let geometry = if closed {
            let polygon = geo::Polygon::new(geo::LineString(coords), vec![]);
            properties.insert(
                "area_m2".into(),
                JsonValue::from(round_to(polygon.chamberlain_duquette_unsigned_area(), 1)),
            );
            Geometry::new(geojson::Value::from(&polygon))
        } else if coords.len() >= 2 {
            Geometry::new(geojson::Value::from(&geo::LineString(coords)))
        } else {
            continue;
        };

        for (key, value) in &way.tags {
            properties.insert(key.clone(), JsonValue::from(value.clone()));
        }
        properties.insert("osm_id".into(), JsonValue::from(way.id));
        properties.insert(
            "height_m".into(),
            JsonValue::from(building_height(&way.tags)),
        );

        features.push(Feature {
            bbox: None,
            geometry: Some(geometry),
            id: Some(geojson::feature::Id::String(format!("way/{}", way.id))),
            properties: Some(properties),
            foreign_members: None,
        });
    }

    let mut foreign_members = JsonObject::new();
    if let Some(generator) = response.generator {
        foreign_members.insert("generator".into(), JsonValue::from(generator));
    }
    foreign_members.insert(
        "fetched_at".into(),
        JsonValue::from(chrono::Utc::now().to_rfc3339()),
    );

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    })
}

/// Height in meters from `height` (e.g. "12", "12 m") or `building:levels`.
pub fn building_height<'a>(tags: impl IntoIterator<Item = (&'a String, &'a String)>) -> f64 {
    let mut levels = None;
    for (key, value) in tags {
        match key.as_str() {
            "height" => {
                if let Some(height) = parse_meters(value) {
                    return height;
                }
            }
            "building:levels" => levels = value.trim().parse::<f64>().ok(),
            _ => {}
        }
    }
    levels
        .filter(|l| *l > 0.0)
        .map(|l| l * METERS_PER_LEVEL)
        .unwrap_or(DEFAULT_HEIGHT_M)
}

fn parse_meters(value: &str) -> Option<f64> {
    let number = value.trim().trim_end_matches('m').trim();
    number.parse::<f64>().ok().filter(|h| *h > 0.0)
}

fn round_to(value: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (value * scale).round() / scale
}
