use axum::response::Response;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::gtfs::departures::Departure;
use crate::gtfs::stops::StopRecord;

use super::error::ApiError;
use super::{ErrorResponse, SharedStore};

#[derive(Clone)]
pub struct StopsState {
    pub store: SharedStore,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StopListResponse {
    pub stops: Vec<StopRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StopDeparturesResponse {
    pub stop_id: String,
    pub departures: Vec<Departure>,
}

/// All stops in the dataset
#[utoipa::path(
    get,
    path = "/api/stops",
    responses(
        (status = 200, description = "Every stop in the dataset", body = StopListResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn list_stops(State(state): State<StopsState>) -> Result<Response, ApiError> {
    let store = state.store.clone();
    let stops = super::resolve_blocking(move || store.resolve_static_stops()).await?;
    debug!(stops = stops.len(), "Serving stop dump");

    Ok(super::cache_for_a_day(Json(StopListResponse { stops })))
}

/// Upcoming departures at a stop
#[utoipa::path(
    get,
    path = "/api/stops/{stop_id}/departures",
    params(
        ("stop_id" = String, Path, description = "GTFS stop id")
    ),
    responses(
        (status = 200, description = "Departures within the window, soonest first", body = StopDeparturesResponse),
        (status = 404, description = "Unknown stop", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "stops"
)]
pub async fn get_stop_departures(
    State(state): State<StopsState>,
    Path(stop_id): Path<String>,
) -> Result<Json<StopDeparturesResponse>, ApiError> {
    let store = state.store.clone();
    let wanted = stop_id.clone();
    let departures = super::resolve_blocking(move || store.resolve_departures(&wanted)).await?;
    debug!(stop_id, departures = departures.len(), "Serving departures");

    Ok(Json(StopDeparturesResponse {
        stop_id,
        departures,
    }))
}

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/", get(list_stops))
        .route("/{stop_id}/departures", get(get_stop_departures))
        .with_state(StopsState { store })
}
