use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use utoipa::ToSchema;

use crate::gtfs::{DatasetFile, GtfsError};

use super::error::ApiError;
use super::SharedStore;

#[derive(Clone)]
pub struct HealthState {
    pub store: SharedStore,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Whether every required dataset file is present
    pub ok: bool,
    /// Directory the GTFS flat files are read from
    pub data_dir: String,
    /// Presence and size of each expected dataset file
    pub files: Vec<DatasetFile>,
    /// Number of artifacts currently held by the cache
    pub cache_entries: usize,
}

/// Dataset and cache health
#[utoipa::path(
    get,
    path = "/api/health",
    responses(
        (status = 200, description = "Dataset status", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(
    State(state): State<HealthState>,
) -> Result<Json<HealthResponse>, ApiError> {
    let store = state.store.clone();
    let status = super::resolve_blocking(move || Ok::<_, GtfsError>(store.status())).await?;

    Ok(Json(HealthResponse {
        ok: status.all_required_present(),
        data_dir: status.data_dir,
        files: status.files,
        cache_entries: status.cache_entries,
    }))
}

pub fn router(store: SharedStore) -> Router {
    let state = HealthState { store };
    Router::new()
        .route("/", get(health_check))
        .with_state(state)
}
