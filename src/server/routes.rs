use axum::{
    Json,
    extract::{Path, Query, State},
};
use geojson::FeatureCollection;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{Instrument, info, info_span};
use uuid::Uuid;

use super::{AppError, AppState};
use crate::{geojson::buildings_to_geojson, overpass::PlaceQuery, types::FetchError};

#[derive(Debug, Deserialize)]
pub struct CityParams {
    pub name: Option<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn city_by_query(
    State(state): State<AppState>,
    Query(params): Query<CityParams>,
) -> Result<Json<Value>, AppError> {
    let query = resolve_place(&state, params.name)?;
    Ok(Json(fetch_buildings(&state, query).await?))
}

pub async fn city_by_path(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let query = PlaceQuery::new(&name)?;
    Ok(Json(fetch_buildings(&state, query).await?))
}

pub async fn city_geojson(
    State(state): State<AppState>,
    Query(params): Query<CityParams>,
) -> Result<Json<FeatureCollection>, AppError> {
    let query = resolve_place(&state, params.name)?;
    let payload = fetch_buildings(&state, query).await?;
    Ok(Json(buildings_to_geojson(&payload)?))
}

/// A missing name falls back to the configured default place; a present
/// but blank one is rejected like any other invalid name.
fn resolve_place(state: &AppState, name: Option<String>) -> Result<PlaceQuery, FetchError> {
    match (name, &state.default_place) {
        (Some(name), _) => PlaceQuery::new(&name),
        (None, Some(default)) => PlaceQuery::new(default),
        (None, None) => Err(FetchError::invalid_input("missing required parameter: name")),
    }
}

async fn fetch_buildings(state: &AppState, query: PlaceQuery) -> Result<Value, AppError> {
    let client = state.client.clone();
    let span = info_span!("fetch", request_id = %Uuid::new_v4(), place = query.place_name());
    let result = tokio::task::spawn_blocking({
        let span = span.clone();
        move || span.in_scope(|| client.fetch(&query))
    })
    .instrument(span)
    .await?;

    let payload = result?;
    info!(
        elements = payload
            .get("elements")
            .and_then(|e| e.as_array())
            .map_or(0, Vec::len),
        "Relaying Overpass payload"
    );
    Ok(payload)
}
