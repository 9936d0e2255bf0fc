use std::time::Duration;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use tracing::{debug, error, warn};

use crate::cache::ArtifactKind;
use crate::config::RealtimeConfig;

use super::error::{bad_gateway, service_unavailable, ApiError};
use super::{ErrorResponse, SharedStore};

#[derive(Clone)]
pub struct RealtimeState {
    pub store: SharedStore,
    pub upstream: Option<Upstream>,
}

#[derive(Clone)]
pub struct Upstream {
    pub client: reqwest::Client,
    pub config: RealtimeConfig,
}

#[derive(Debug, Deserialize)]
pub struct RealtimeQuery {
    pub stop: String,
    pub line: Option<String>,
}

/// Relay of the upstream SIRI stop-monitoring feed
#[utoipa::path(
    get,
    path = "/api/realtime",
    params(
        ("stop" = String, Query, description = "Stop id, passed upstream as MonitoringRef"),
        ("line" = Option<String>, Query, description = "Optional line filter, passed upstream as LineRef")
    ),
    responses(
        (status = 200, description = "Upstream SIRI response, relayed verbatim", body = serde_json::Value),
        (status = 502, description = "Upstream request failed", body = ErrorResponse),
        (status = 503, description = "No realtime upstream configured", body = ErrorResponse)
    ),
    tag = "realtime"
)]
pub async fn get_realtime(
    State(state): State<RealtimeState>,
    Query(query): Query<RealtimeQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Some(upstream) = state.upstream.as_ref() else {
        return Err(service_unavailable("Realtime upstream not configured"));
    };

    let key = format!(
        "realtime_{}_{}",
        query.stop,
        query.line.as_deref().unwrap_or("all")
    );
    let store = state.store.clone();
    let cache_key = key.clone();
    let cached = tokio::task::spawn_blocking(move || {
        store
            .cache()
            .get::<serde_json::Value>(ArtifactKind::Realtime, &cache_key)
    })
    .await
    .ok()
    .flatten();
    if let Some(value) = cached {
        debug!(stop = query.stop, "Serving relayed realtime from cache");
        return Ok(Json(value));
    }

    let mut params = vec![
        ("Key", upstream.config.api_key.clone()),
        ("MonitoringRef", query.stop.clone()),
        ("StopVisitDetailLevel", upstream.config.detail_level.clone()),
        ("PreviewInterval", upstream.config.preview_interval.clone()),
    ];
    if let Some(line) = &query.line {
        params.push(("LineRef", line.clone()));
    }

    let response = upstream
        .client
        .get(&upstream.config.base_url)
        .query(&params)
        .send()
        .await
        .map_err(|e| {
            error!(error = %e, "Realtime upstream request failed");
            bad_gateway("Upstream realtime request failed")
        })?;
    if !response.status().is_success() {
        warn!(status = %response.status(), "Realtime upstream answered with an error");
        return Err(bad_gateway(format!(
            "Upstream realtime request failed with status {}",
            response.status()
        )));
    }
    let value: serde_json::Value = response.json().await.map_err(|e| {
        error!(error = %e, "Realtime upstream returned a non-JSON body");
        bad_gateway("Upstream realtime response was not JSON")
    })?;
    debug!(stop = query.stop, "Relaying fresh realtime response");

    let store = state.store.clone();
    let to_cache = value.clone();
    tokio::task::spawn_blocking(move || {
        if let Err(e) = store.cache().put(ArtifactKind::Realtime, &key, &to_cache) {
            warn!(key = %key, error = %e, "Failed caching realtime artifact");
        }
    });

    Ok(Json(value))
}

pub fn router(store: SharedStore, config: Option<RealtimeConfig>) -> Router {
    let upstream = config.and_then(|config| {
        match reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
        {
            Ok(client) => Some(Upstream { client, config }),
            Err(e) => {
                error!(error = %e, "Failed building realtime HTTP client, /api/realtime disabled");
                None
            }
        }
    });
    Router::new()
        .route("/", get(get_realtime))
        .with_state(RealtimeState { store, upstream })
}
