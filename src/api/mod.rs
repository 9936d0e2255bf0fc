pub mod error;
pub mod health;
pub mod lines;
pub mod realtime;
pub mod routes;
pub mod stops;

pub use error::{internal_error, ErrorResponse};

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tracing::error;

use crate::config::Config;
use crate::gtfs::{GtfsError, GtfsStore};

use error::ApiError;

pub type SharedStore = Arc<GtfsStore>;

/// Marks a response as client-cacheable for a day. Used on dataset-derived
/// payloads that only change when the dataset is replaced.
pub(crate) fn cache_for_a_day(body: impl IntoResponse) -> Response {
    let mut response = body.into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=86400"),
    );
    response
}

/// Runs an engine resolution on the blocking pool and maps both failure
/// layers onto the wire error shape.
pub(crate) async fn resolve_blocking<T>(
    task: impl FnOnce() -> Result<T, GtfsError> + Send + 'static,
) -> Result<T, ApiError>
where
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result.map_err(error::gtfs_error),
        Err(e) => {
            error!(error = %e, "Blocking resolution task failed");
            Err(internal_error("Resolution task failed"))
        }
    }
}

pub fn router(store: SharedStore, config: &Config) -> Router {
    Router::new()
        .nest(
            "/lines",
            lines::router(store.clone(), config.simplify.default_tolerance),
        )
        .nest("/routes", routes::router(store.clone()))
        .nest("/stops", stops::router(store.clone()))
        .nest("/realtime", realtime::router(store.clone(), config.realtime.clone()))
        .nest("/health", health::router(store))
}
