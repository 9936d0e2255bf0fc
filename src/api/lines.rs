use std::collections::BTreeMap;

use axum::response::Response;
use axum::{
    extract::{Path, Query, State},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::gtfs::RouteStops;
use crate::simplify;

use super::error::{bad_request, ApiError};
use super::{ErrorResponse, SharedStore};

#[derive(Clone)]
pub struct LinesState {
    pub store: SharedStore,
    pub default_tolerance: f64,
}

#[derive(Debug, Deserialize)]
pub struct ShapeQuery {
    pub tolerance: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct StopsQuery {
    pub direction: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LineShapeResponse {
    pub line: String,
    /// Simplification tolerance in degrees that was applied
    pub tolerance: f64,
    /// Direction id ("0"/"1") to ordered [lat, lon] points
    pub shapes: BTreeMap<String, Vec<[f64; 2]>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LineStopsResponse {
    pub line: String,
    pub routes: Vec<RouteStops>,
}

/// Per-direction shape of a line, simplified for map rendering
#[utoipa::path(
    get,
    path = "/api/lines/{line}/shape",
    params(
        ("line" = String, Path, description = "Rider-facing line number, e.g. '60'"),
        ("tolerance" = Option<f64>, Query, description = "Simplification tolerance in degrees; defaults from config")
    ),
    responses(
        (status = 200, description = "Shape points per direction", body = LineShapeResponse),
        (status = 400, description = "Invalid tolerance", body = ErrorResponse),
        (status = 404, description = "Unknown line or no shape data", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "lines"
)]
pub async fn get_line_shape(
    State(state): State<LinesState>,
    Path(line): Path<String>,
    Query(query): Query<ShapeQuery>,
) -> Result<Response, ApiError> {
    let tolerance = query.tolerance.unwrap_or(state.default_tolerance);
    if !tolerance.is_finite() || tolerance < 0.0 {
        return Err(bad_request("tolerance must be a non-negative number"));
    }

    let store = state.store.clone();
    let wanted = line.clone();
    let resolved = super::resolve_blocking(move || store.resolve_line_shape(&wanted)).await?;

    let shapes: BTreeMap<String, Vec<[f64; 2]>> = resolved
        .into_iter()
        .map(|(direction, points)| (direction, simplify::simplify(&points, tolerance)))
        .collect();
    debug!(line, directions = shapes.len(), "Serving line shape");

    Ok(super::cache_for_a_day(Json(LineShapeResponse {
        line,
        tolerance,
        shapes,
    })))
}

/// Ordered stops of each route variant of a line
#[utoipa::path(
    get,
    path = "/api/lines/{line}/stops",
    params(
        ("line" = String, Path, description = "Rider-facing line number"),
        ("direction" = Option<String>, Query, description = "Restrict to one direction, \"0\" or \"1\"")
    ),
    responses(
        (status = 200, description = "Stops per route variant", body = LineStopsResponse),
        (status = 404, description = "Unknown line", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "lines"
)]
pub async fn get_line_stops(
    State(state): State<LinesState>,
    Path(line): Path<String>,
    Query(query): Query<StopsQuery>,
) -> Result<Json<LineStopsResponse>, ApiError> {
    let store = state.store.clone();
    let wanted = line.clone();
    let routes = super::resolve_blocking(move || {
        store.resolve_stops_for_line(&wanted, query.direction.as_deref())
    })
    .await?;
    debug!(line, variants = routes.len(), "Serving line stops");

    Ok(Json(LineStopsResponse { line, routes }))
}

pub fn router(store: SharedStore, default_tolerance: f64) -> Router {
    let state = LinesState {
        store,
        default_tolerance,
    };
    Router::new()
        .route("/{line}/shape", get(get_line_shape))
        .route("/{line}/stops", get(get_line_stops))
        .with_state(state)
}
