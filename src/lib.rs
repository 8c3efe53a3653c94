//! Building footprints for a named place, fetched from an Overpass
//! interpreter and relayed to browser clients as JSON or GeoJSON.

pub mod geojson;
pub mod overpass;
pub mod server;
pub mod settings;
pub mod types;
