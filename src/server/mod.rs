//! # Server Module
//!
//! The browser facing HTTP surface. Handlers validate the place name, run
//! the blocking Overpass fetch on tokio's blocking pool and map every
//! [`FetchError`](crate::types::FetchError) to a JSON error body. The
//! browser client itself is served from the static directory.

mod error;
mod routes;

use std::{path::PathBuf, sync::Arc};

use axum::{Router, routing::get};
use tower_http::{
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};

pub use error::*;
pub use routes::*;

use crate::overpass::OverpassClient;

/// Shared, read-only state behind every handler.
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<OverpassClient>,
    pub default_place: Option<String>,
    /// Holds `index.html` (served at `/`) and the scripts under `/static`.
    pub static_dir: PathBuf,
}

impl AppState {
    pub fn new(client: OverpassClient, default_place: Option<String>) -> Self {
        AppState {
            client: Arc::new(client),
            default_place,
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
        }
    }

    pub fn with_static_dir(mut self, static_dir: impl Into<PathBuf>) -> Self {
        self.static_dir = static_dir.into();
        self
    }
}

pub const DEFAULT_STATIC_DIR: &str = "static";

pub fn router(state: AppState) -> Router {
    let index = ServeFile::new(state.static_dir.join("index.html"));
    let assets = ServeDir::new(&state.static_dir);
    Router::new()
        .route_service("/", index)
        .nest_service("/static", assets)
        .route("/health", get(health))
        .route("/api/city", get(city_by_query))
        .route("/api/city/geojson", get(city_geojson))
        .route("/api/city/{name}", get(city_by_path))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
