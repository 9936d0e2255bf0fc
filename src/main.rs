pub mod api;
mod cache;
mod config;
mod gtfs;
mod simplify;

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use cache::{CacheStore, TtlTable};
use config::{Config, ConfigError};
use gtfs::GtfsStore;

#[derive(OpenApi)]
#[openapi(
    info(title = "Bus Map API", version = "0.1.0"),
    paths(
        api::lines::get_line_shape,
        api::lines::get_line_stops,
        api::routes::list_routes,
        api::routes::get_route_shape,
        api::stops::list_stops,
        api::stops::get_stop_departures,
        api::realtime::get_realtime,
        api::health::health_check,
    ),
    components(schemas(
        api::ErrorResponse,
        api::lines::LineShapeResponse,
        api::lines::LineStopsResponse,
        api::routes::RouteListResponse,
        api::routes::RouteShapeResponse,
        api::stops::StopListResponse,
        api::stops::StopDeparturesResponse,
        api::health::HealthResponse,
        gtfs::RouteStops,
        gtfs::StopOnRoute,
        gtfs::DatasetFile,
        gtfs::routes::RouteRecord,
        gtfs::stops::StopRecord,
        gtfs::departures::Departure,
    )),
    tags(
        (name = "lines", description = "Line shape and stop listing endpoints"),
        (name = "routes", description = "Static route data"),
        (name = "stops", description = "Static stop data and departure boards"),
        (name = "realtime", description = "Relayed SIRI stop-monitoring feed"),
        (name = "health", description = "Dataset health check")
    )
)]
struct ApiDoc;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .init();

    // Load config; a missing file is fine, a broken one is not
    let config = match Config::load("config.yaml") {
        Ok(config) => config,
        Err(ConfigError::ReadError(e)) => {
            tracing::warn!(error = %e, "config.yaml not readable, using defaults");
            Config::default()
        }
        Err(e) => panic!("Failed to load config: {e}"),
    };
    let timezone = config.tz().expect("Invalid timezone in config");
    tracing::info!(
        data_dir = %config.data_dir.display(),
        cache_dir = %config.cache_dir.display(),
        timezone = %timezone,
        "Loaded configuration"
    );

    // Build CORS layer based on config
    let cors_layer = if config.cors_permissive {
        tracing::warn!("CORS: Permissive mode enabled (all origins allowed)");
        CorsLayer::permissive()
    } else if !config.cors_origins.is_empty() {
        tracing::info!(origins = ?config.cors_origins, "CORS: Restricting to configured origins");
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([axum::http::Method::GET, axum::http::Method::OPTIONS])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    } else {
        panic!("CORS configuration error: Either set 'cors_origins' with allowed origins, or set 'cors_permissive: true'");
    };

    // Build the resolution engine
    let cache_store = CacheStore::new(
        &config.cache_dir,
        TtlTable {
            static_secs: config.cache.static_ttl_secs,
            departures_secs: config.cache.departures_ttl_secs,
            realtime_secs: config.cache.realtime_ttl_secs,
        },
    )
    .expect("Failed to create cache directory");
    let store = Arc::new(GtfsStore::new(
        config.data_dir.clone(),
        timezone,
        config.departures.grace_minutes,
        cache_store,
    ));

    let status = store.status();
    if status.all_required_present() {
        tracing::info!(cache_entries = status.cache_entries, "GTFS dataset complete");
    } else {
        let missing: Vec<&str> = status
            .files
            .iter()
            .filter(|f| f.required && !f.present)
            .map(|f| f.name.as_str())
            .collect();
        tracing::warn!(?missing, "GTFS dataset incomplete, affected requests will fail");
    }

    // Build the app
    let app = Router::new()
        .route("/", get(root))
        .nest("/api", api::router(store, &config))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .unwrap_or_else(|e| panic!("Failed to bind to {}: {e}", config.bind_addr));

    tracing::info!("Server running on http://{}", config.bind_addr);
    tracing::info!("Swagger UI: http://{}/swagger-ui", config.bind_addr);

    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}

async fn root() -> &'static str {
    "Bus Map API"
}
