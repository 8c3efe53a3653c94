use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

// Overpass API, thanks to: https://transform.tools/json-to-rust-serde
#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverpassResponse {
    pub version: Option<f64>,
    pub generator: Option<String>,
    pub osm3s: Option<Osm3s>,
    /// Runtime warnings, e.g. when the server side timeout was hit mid-query.
    pub remark: Option<String>,
    #[serde(default)]
    pub elements: Vec<Element>,
}

#[derive(Default, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Osm3s {
    pub timestamp_osm_base: Option<String>,
    pub timestamp_areas_base: Option<String>,
    pub copyright: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum ElementType {
    Node,
    Way,
    Relation,
    Area,
    Other,
}

impl From<String> for ElementType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "node" => ElementType::Node,
            "way" => ElementType::Way,
            "relation" => ElementType::Relation,
            "area" => ElementType::Area,
            _ => ElementType::Other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Element {
    #[serde(rename = "type")]
    pub element_type: ElementType,
    pub id: i64,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    #[serde(default)]
    pub nodes: Vec<i64>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl Element {
    pub fn is_building(&self) -> bool {
        self.element_type == ElementType::Way && self.tags.contains_key("building")
    }

    /// `(lon, lat)` for nodes that carry coordinates.
    pub fn position(&self) -> Option<(f64, f64)> {
        match (self.element_type, self.lon, self.lat) {
            (ElementType::Node, Some(lon), Some(lat)) => Some((lon, lat)),
            _ => None,
        }
    }
}
