pub mod calendar;
pub mod departures;
pub mod error;
pub mod index;
pub mod reader;
pub mod routes;
pub mod shapes;
pub mod stop_times;
pub mod stops;
pub mod trips;

pub use error::GtfsError;

use std::collections::BTreeMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use utoipa::ToSchema;

use crate::cache::{ArtifactKind, CacheStore};

use departures::Departure;
use routes::RouteRecord;
use stops::StopRecord;

/// Per-direction points of a line: "0"/"1" -> ordered [lat, lon] pairs.
pub type LineShape = BTreeMap<String, Vec<[f64; 2]>>;

/// Ordered stops of one route variant of a line.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RouteStops {
    pub route_id: String,
    pub route_name: Option<String>,
    pub direction: String,
    pub headsign: Option<String>,
    pub stops: Vec<StopOnRoute>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct StopOnRoute {
    pub id: String,
    pub name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub sequence: i64,
}

/// Presence and size of one expected dataset file.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DatasetFile {
    pub name: String,
    pub required: bool,
    pub present: bool,
    pub size_bytes: Option<u64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DatasetStatus {
    pub data_dir: String,
    pub files: Vec<DatasetFile>,
    pub cache_entries: usize,
}

impl DatasetStatus {
    pub fn all_required_present(&self) -> bool {
        self.files.iter().all(|f| f.present || !f.required)
    }
}

const REQUIRED_FILES: [&str; 6] = [
    "routes.txt",
    "trips.txt",
    "shapes.txt",
    "stops.txt",
    "stop_times.txt",
    "calendar.txt",
];

/// Resolution engine over one GTFS dataset directory. Every compound
/// operation consults the artifact cache first and recomputes from the flat
/// files on a miss. All methods do blocking file I/O.
pub struct GtfsStore {
    data_dir: PathBuf,
    tz: Tz,
    grace_minutes: i64,
    cache: CacheStore,
}

impl GtfsStore {
    pub fn new(data_dir: PathBuf, tz: Tz, grace_minutes: i64, cache: CacheStore) -> Self {
        Self {
            data_dir,
            tz,
            grace_minutes,
            cache,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.tz
    }

    pub fn cache(&self) -> &CacheStore {
        &self.cache
    }

    /// Shape of a line, one point list per direction. The stages short-
    /// circuit with a named error as soon as one yields nothing, so a
    /// result map is never partial-with-error. A direction whose primary
    /// shape has no points is dropped from the map.
    pub fn resolve_line_shape(&self, line: &str) -> Result<LineShape, GtfsError> {
        let line = line.trim();
        let key = format!("line_shape_{line}");
        if let Some(shape) = self.cache.get::<LineShape>(ArtifactKind::Static, &key) {
            return Ok(shape);
        }

        let route_ids = routes::route_ids_for_line(&self.data_dir, line)?;
        if route_ids.is_empty() {
            return Err(GtfsError::LineNotFound(line.to_string()));
        }
        let by_direction = trips::shape_ids_by_direction(&self.data_dir, &route_ids)?;
        if by_direction.is_empty() {
            return Err(GtfsError::NoShapesForLine(line.to_string()));
        }

        let mut shape = LineShape::new();
        for (direction, shape_ids) in &by_direction {
            let Some(primary) = trips::pick_primary_shape(shape_ids) else {
                continue;
            };
            let points = shapes::extract_points(&self.data_dir, primary)?;
            if points.is_empty() {
                warn!(direction, shape_id = primary, "Primary shape has no points");
                continue;
            }
            shape.insert(direction.clone(), points);
        }
        if shape.is_empty() {
            return Err(GtfsError::NoShapePoints(line.to_string()));
        }

        self.store(ArtifactKind::Static, &key, &shape);
        info!(line, directions = shape.len(), "Resolved line shape");
        Ok(shape)
    }

    /// Primary shape of a single route: the first shape carried by any of
    /// its trips, in file order.
    pub fn resolve_route_shape(&self, route_id: &str) -> Result<Vec<[f64; 2]>, GtfsError> {
        let key = format!("shape_{route_id}");
        if let Some(points) = self.cache.get::<Vec<[f64; 2]>>(ArtifactKind::Static, &key) {
            return Ok(points);
        }

        let Some(shape_id) = trips::primary_shape_for_route(&self.data_dir, route_id)? else {
            return Err(GtfsError::NoShapeForRoute(route_id.to_string()));
        };
        let points = shapes::extract_points(&self.data_dir, &shape_id)?;
        if points.is_empty() {
            return Err(GtfsError::NoShapeForRoute(route_id.to_string()));
        }

        self.store(ArtifactKind::Static, &key, &points);
        info!(route_id, shape_id, points = points.len(), "Resolved route shape");
        Ok(points)
    }

    /// Stops served by each route variant of a line, one entry per
    /// (route, direction), built from the first trip of that direction.
    pub fn resolve_stops_for_line(
        &self,
        line: &str,
        direction: Option<&str>,
    ) -> Result<Vec<RouteStops>, GtfsError> {
        let line = line.trim();
        let key = format!("line_stops_{}_{}", line, direction.unwrap_or("all"));
        if let Some(stops) = self.cache.get::<Vec<RouteStops>>(ArtifactKind::Static, &key) {
            return Ok(stops);
        }

        let line_routes = routes::routes_for_line(&self.data_dir, line)?;
        if line_routes.is_empty() {
            return Err(GtfsError::LineNotFound(line.to_string()));
        }
        let route_ids: Vec<String> = line_routes.iter().map(|r| r.route_id.clone()).collect();
        let trips_by_route = trips::trips_by_route(&self.data_dir, &route_ids)?;
        let details = stops::stop_details(&self.data_dir)?;

        let mut result = Vec::new();
        for route in &line_routes {
            let Some(variants) = trips_by_route.get(&route.route_id) else {
                continue;
            };
            let mut directions_done: Vec<&str> = Vec::new();
            for variant in variants {
                if direction.is_some_and(|d| d != variant.direction) {
                    continue;
                }
                if directions_done.contains(&variant.direction.as_str()) {
                    continue;
                }
                directions_done.push(&variant.direction);

                let trip_stops = stop_times::stops_of_trip(&self.data_dir, &variant.trip_id)?;
                if trip_stops.is_empty() {
                    continue;
                }
                let stops_out = trip_stops
                    .iter()
                    .map(|ts| {
                        let detail = details.get(&ts.stop_id);
                        StopOnRoute {
                            id: ts.stop_id.clone(),
                            name: detail.and_then(|d| d.stop_name.clone()),
                            lat: detail.and_then(|d| d.lat),
                            lon: detail.and_then(|d| d.lon),
                            sequence: ts.sequence,
                        }
                    })
                    .collect();
                result.push(RouteStops {
                    route_id: route.route_id.clone(),
                    route_name: route.route_long_name.clone(),
                    direction: variant.direction.clone(),
                    headsign: variant.headsign.clone(),
                    stops: stops_out,
                });
            }
        }

        self.store(ArtifactKind::Static, &key, &result);
        info!(line, variants = result.len(), "Resolved stops for line");
        Ok(result)
    }

    /// Upcoming departures at a stop, grace-window filtered against the
    /// current time.
    pub fn resolve_departures(&self, stop_id: &str) -> Result<Vec<Departure>, GtfsError> {
        self.resolve_departures_at(stop_id, Utc::now().with_timezone(&self.tz))
    }

    /// The window filter always runs against `now`, cache hit or not, so a
    /// board cached an hour ago never shows long-gone departures. An empty
    /// board is only an error when the stop itself is unknown.
    pub fn resolve_departures_at(
        &self,
        stop_id: &str,
        now: DateTime<Tz>,
    ) -> Result<Vec<Departure>, GtfsError> {
        let key = format!("departures_{stop_id}");
        let board = match self
            .cache
            .get::<Vec<Departure>>(ArtifactKind::Departures, &key)
        {
            Some(board) => board,
            None => {
                let board = departures::compute_departures(&self.data_dir, stop_id, now)?;
                if board.is_empty() && !stops::stop_exists(&self.data_dir, stop_id)? {
                    return Err(GtfsError::UnknownStop(stop_id.to_string()));
                }
                self.store(ArtifactKind::Departures, &key, &board);
                board
            }
        };
        Ok(departures::filter_recent(
            board,
            now.with_timezone(&Utc),
            self.grace_minutes,
        ))
    }

    /// Full stop dump, long TTL.
    pub fn resolve_static_stops(&self) -> Result<Vec<StopRecord>, GtfsError> {
        if let Some(stops) = self.cache.get::<Vec<StopRecord>>(ArtifactKind::Static, "stops") {
            return Ok(stops);
        }
        let stops = stops::load_stop_records(&self.data_dir)?;
        self.store(ArtifactKind::Static, "stops", &stops);
        info!(stops = stops.len(), "Loaded stop dump");
        Ok(stops)
    }

    /// Full route dump, agency names joined, long TTL.
    pub fn resolve_static_routes(&self) -> Result<Vec<RouteRecord>, GtfsError> {
        if let Some(routes) = self
            .cache
            .get::<Vec<RouteRecord>>(ArtifactKind::Static, "routes")
        {
            return Ok(routes);
        }
        let routes = routes::load_route_records(&self.data_dir)?;
        self.store(ArtifactKind::Static, "routes", &routes);
        info!(routes = routes.len(), "Loaded route dump");
        Ok(routes)
    }

    /// Dataset and cache health, for the status endpoint. Never fails.
    pub fn status(&self) -> DatasetStatus {
        let mut files: Vec<DatasetFile> = REQUIRED_FILES
            .iter()
            .map(|name| self.dataset_file(name, true))
            .collect();
        files.push(self.dataset_file("agency.txt", false));
        DatasetStatus {
            data_dir: self.data_dir.display().to_string(),
            files,
            cache_entries: self.cache.entry_count(),
        }
    }

    fn dataset_file(&self, name: &str, required: bool) -> DatasetFile {
        let meta = std::fs::metadata(self.data_dir.join(name)).ok();
        DatasetFile {
            name: name.to_string(),
            required,
            present: meta.as_ref().is_some_and(|m| m.is_file()),
            size_bytes: meta.and_then(|m| m.is_file().then(|| m.len())),
        }
    }

    /// A cache write failure costs a recompute later, never the request.
    fn store<T: Serialize>(&self, kind: ArtifactKind, key: &str, value: &T) {
        if let Err(e) = self.cache.put(kind, key, value) {
            warn!(key, error = %e, "Failed writing cache artifact");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::TtlTable;
    use chrono::TimeZone;
    use std::path::Path;

    const TZ: Tz = chrono_tz::Asia::Jerusalem;

    fn write_dataset(dir: &Path) {
        std::fs::write(
            dir.join("routes.txt"),
            "\u{FEFF}route_id,agency_id,route_short_name,route_long_name,route_type\n\
             R1,A1,60,Central - Harbor,3\n\
             R2,A1,60,Harbor - Central,3\n\
             R3,A1,77,Ring,3\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("trips.txt"),
            "route_id,service_id,trip_id,trip_headsign,direction_id,shape_id\n\
             R1,WK,T1,Harbor,0,S1\n\
             R2,WK,T2,Central,1,S2\n\
             R3,WK,T3,Ring,0,S3\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("shapes.txt"),
            "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n\
             S1,32.00,34.80,1\n\
             S1,32.01,34.81,2\n\
             S2,32.10,34.90,2\n\
             S2,32.11,34.91,1\n\
             S3,31.00,35.00,1\n\
             S3,31.01,35.01,2\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("stops.txt"),
            "stop_id,stop_name,stop_lat,stop_lon\n\
             ST1,Central Station,32.00,34.80\n\
             ST2,Harbor,32.01,34.81\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("stop_times.txt"),
            "trip_id,arrival_time,departure_time,stop_id,stop_sequence\n\
             T1,10:30:00,10:30:00,ST1,1\n\
             T1,10:40:00,10:40:00,ST2,2\n\
             T2,11:00:00,11:00:00,ST1,1\n",
        )
        .unwrap();
        std::fs::write(
            dir.join("calendar.txt"),
            "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
             WK,1,1,1,1,1,1,1,20250101,20251231\n",
        )
        .unwrap();
    }

    fn test_store(data: &tempfile::TempDir, cache: &tempfile::TempDir) -> GtfsStore {
        write_dataset(data.path());
        let cache = CacheStore::new(
            cache.path(),
            TtlTable {
                static_secs: 86_400,
                departures_secs: 3_600,
                realtime_secs: 60,
            },
        )
        .unwrap();
        GtfsStore::new(data.path().to_path_buf(), TZ, 30, cache)
    }

    #[test]
    fn test_line_shape_two_directions() {
        let data = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let store = test_store(&data, &cache);

        let shape = store.resolve_line_shape("60").unwrap();
        assert_eq!(shape.len(), 2);
        assert_eq!(shape["0"], vec![[32.00, 34.80], [32.01, 34.81]]);
        // S2's points come back sequence-ordered despite file order
        assert_eq!(shape["1"], vec![[32.11, 34.91], [32.10, 34.90]]);
    }

    #[test]
    fn test_every_fixture_line_has_a_nonempty_direction() {
        let data = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let store = test_store(&data, &cache);

        for line in ["60", "77"] {
            let shape = store.resolve_line_shape(line).unwrap();
            assert!(shape.values().any(|points| !points.is_empty()), "line {line}");
        }
    }

    #[test]
    fn test_line_shape_no_match_stages() {
        let data = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let store = test_store(&data, &cache);

        let err = store.resolve_line_shape("999").unwrap_err();
        assert!(matches!(err, GtfsError::LineNotFound(_)));
        assert!(err.is_no_match());

        // routes exist but no trips carry shapes for them
        std::fs::write(
            data.path().join("trips.txt"),
            "route_id,service_id,trip_id,trip_headsign,direction_id,shape_id\n\
             R1,WK,T1,Harbor,0,\n",
        )
        .unwrap();
        let err = store.resolve_line_shape("60").unwrap_err();
        assert!(matches!(err, GtfsError::NoShapesForLine(_)));
    }

    #[test]
    fn test_line_shape_served_from_cache() {
        let data = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let store = test_store(&data, &cache);

        let first = store.resolve_line_shape("60").unwrap();
        // the files are gone, only the cache can answer now
        std::fs::remove_file(data.path().join("shapes.txt")).unwrap();
        std::fs::remove_file(data.path().join("routes.txt")).unwrap();
        let second = store.resolve_line_shape("60").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_route_shape() {
        let data = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let store = test_store(&data, &cache);

        let points = store.resolve_route_shape("R3").unwrap();
        assert_eq!(points, vec![[31.00, 35.00], [31.01, 35.01]]);

        let err = store.resolve_route_shape("R404").unwrap_err();
        assert!(matches!(err, GtfsError::NoShapeForRoute(_)));
    }

    #[test]
    fn test_stops_for_line_with_direction_filter() {
        let data = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let store = test_store(&data, &cache);

        let all = store.resolve_stops_for_line("60", None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].route_id, "R1");
        assert_eq!(all[0].direction, "0");
        assert_eq!(all[0].headsign.as_deref(), Some("Harbor"));
        let ids: Vec<&str> = all[0].stops.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["ST1", "ST2"]);
        assert_eq!(all[0].stops[0].name.as_deref(), Some("Central Station"));

        let inbound = store.resolve_stops_for_line("60", Some("1")).unwrap();
        assert_eq!(inbound.len(), 1);
        assert_eq!(inbound[0].route_id, "R2");

        let err = store.resolve_stops_for_line("999", None).unwrap_err();
        assert!(matches!(err, GtfsError::LineNotFound(_)));
    }

    #[test]
    fn test_departures_cache_hit_still_filters() {
        let data = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let store = test_store(&data, &cache);

        // 2025-06-02 10:00 local; both T1 (10:30) and T2 (11:00) upcoming
        let now = TZ.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();
        let board = store.resolve_departures_at("ST1", now).unwrap();
        let trips: Vec<&str> = board.iter().map(|d| d.trip_id.as_str()).collect();
        assert_eq!(trips, vec!["T1", "T2"]);

        // same cached artifact 75 minutes later: 10:30 has aged out
        std::fs::remove_file(data.path().join("stop_times.txt")).unwrap();
        let later = TZ.with_ymd_and_hms(2025, 6, 2, 11, 15, 0).unwrap();
        let board = store.resolve_departures_at("ST1", later).unwrap();
        let trips: Vec<&str> = board.iter().map(|d| d.trip_id.as_str()).collect();
        assert_eq!(trips, vec!["T2"]);
    }

    #[test]
    fn test_departures_unknown_stop_vs_quiet_stop() {
        let data = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let store = test_store(&data, &cache);
        let now = TZ.with_ymd_and_hms(2025, 6, 2, 10, 0, 0).unwrap();

        let err = store.resolve_departures_at("ST404", now).unwrap_err();
        assert!(matches!(err, GtfsError::UnknownStop(_)));

        // a stop that exists but is never visited answers with an empty board
        std::fs::write(
            data.path().join("stops.txt"),
            "stop_id,stop_name,stop_lat,stop_lon\nST9,Quiet Corner,32.05,34.85\n",
        )
        .unwrap();
        let board = store.resolve_departures_at("ST9", now).unwrap();
        assert!(board.is_empty());
    }

    #[test]
    fn test_static_dumps() {
        let data = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let store = test_store(&data, &cache);

        let stops = store.resolve_static_stops().unwrap();
        assert_eq!(stops.len(), 2);
        let routes = store.resolve_static_routes().unwrap();
        assert_eq!(routes.len(), 3);
        assert_eq!(routes[0].route_short_name.as_deref(), Some("60"));
    }

    #[test]
    fn test_status_reports_presence() {
        let data = tempfile::tempdir().unwrap();
        let cache = tempfile::tempdir().unwrap();
        let store = test_store(&data, &cache);

        let status = store.status();
        assert!(status.all_required_present());
        let agency = status.files.iter().find(|f| f.name == "agency.txt").unwrap();
        assert!(!agency.required);
        assert!(!agency.present);

        std::fs::remove_file(data.path().join("calendar.txt")).unwrap();
        assert!(!store.status().all_required_present());
    }
}
