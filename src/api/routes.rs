use axum::response::Response;
use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use tracing::debug;
use utoipa::ToSchema;

use crate::gtfs::routes::RouteRecord;

use super::error::ApiError;
use super::{ErrorResponse, SharedStore};

#[derive(Clone)]
pub struct RoutesState {
    pub store: SharedStore,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteListResponse {
    pub routes: Vec<RouteRecord>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RouteShapeResponse {
    pub route_id: String,
    /// Ordered [lat, lon] points of the route's primary shape
    pub points: Vec<[f64; 2]>,
}

/// All routes in the dataset, agency names joined
#[utoipa::path(
    get,
    path = "/api/routes",
    responses(
        (status = 200, description = "Every route in the dataset", body = RouteListResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn list_routes(State(state): State<RoutesState>) -> Result<Response, ApiError> {
    let store = state.store.clone();
    let routes = super::resolve_blocking(move || store.resolve_static_routes()).await?;
    debug!(routes = routes.len(), "Serving route dump");

    Ok(super::cache_for_a_day(Json(RouteListResponse { routes })))
}

/// Primary shape of one route
#[utoipa::path(
    get,
    path = "/api/routes/{route_id}/shape",
    params(
        ("route_id" = String, Path, description = "GTFS route id")
    ),
    responses(
        (status = 200, description = "Shape points of the route", body = RouteShapeResponse),
        (status = 404, description = "No shape for this route", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    tag = "routes"
)]
pub async fn get_route_shape(
    State(state): State<RoutesState>,
    Path(route_id): Path<String>,
) -> Result<Response, ApiError> {
    let store = state.store.clone();
    let wanted = route_id.clone();
    let points = super::resolve_blocking(move || store.resolve_route_shape(&wanted)).await?;
    debug!(route_id, points = points.len(), "Serving route shape");

    Ok(super::cache_for_a_day(Json(RouteShapeResponse {
        route_id,
        points,
    })))
}

pub fn router(store: SharedStore) -> Router {
    Router::new()
        .route("/", get(list_routes))
        .route("/{route_id}/shape", get(get_route_shape))
        .with_state(RoutesState { store })
}
