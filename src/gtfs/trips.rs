use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use tracing::debug;

use super::error::GtfsError;
use super::index;
use super::reader::{non_empty, TableReader};

/// One trip of a route, as needed by the line-stops pipeline.
#[derive(Debug, Clone)]
pub struct TripVariant {
    pub trip_id: String,
    pub direction: String,
    pub headsign: Option<String>,
}

/// GTFS directions are binary. Anything that is not literally "1" (absent,
/// empty, malformed) counts as the default direction "0".
pub fn normalize_direction(raw: Option<&str>) -> String {
    match raw.map(str::trim) {
        Some("1") => "1".to_string(),
        _ => "0".to_string(),
    }
}

/// Which shape id represents a direction when several variants exist: the
/// first one in trips.txt file order. Kept as its own function so the
/// tie-break can change (longest, most used, ...) without touching the join.
pub fn pick_primary_shape(shape_ids: &[String]) -> Option<&str> {
    shape_ids.first().map(String::as_str)
}

/// Scans trips.txt once and groups the shape ids of the given routes by
/// direction. Within a direction, shape ids keep first-appearance order and
/// duplicates are dropped (first occurrence wins). Directions without any
/// matching trip are absent from the map. Trips without a shape id are
/// skipped; a trips.txt without a shape_id column yields an empty map.
pub fn shape_ids_by_direction(
    data_dir: &Path,
    route_ids: &[String],
) -> Result<BTreeMap<String, Vec<String>>, GtfsError> {
    let mut rdr = TableReader::open(data_dir, "trips.txt")?;
    let idx_route = rdr.require_column("route_id")?;
    let idx_shape = match rdr.column("shape_id") {
        Some(idx) => idx,
        None => {
            debug!("trips.txt has no shape_id column");
            return Ok(BTreeMap::new());
        }
    };
    let idx_dir = rdr.column("direction_id");

    let wanted: HashSet<&str> = route_ids.iter().map(String::as_str).collect();
    let mut by_direction: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for result in rdr.records() {
        let record = result?;
        if !wanted.contains(record.get(idx_route).unwrap_or("")) {
            continue;
        }
        let shape_id = record.get(idx_shape).unwrap_or("");
        if shape_id.is_empty() {
            continue;
        }
        let direction = normalize_direction(idx_dir.and_then(|i| record.get(i)));
        let shapes = by_direction.entry(direction).or_default();
        if !shapes.iter().any(|s| s == shape_id) {
            shapes.push(shape_id.to_string());
        }
    }
    debug!(
        routes = route_ids.len(),
        directions = by_direction.len(),
        "Grouped shape ids by direction"
    );
    Ok(by_direction)
}

/// Trips of the given routes grouped per route, in file order.
pub fn trips_by_route(
    data_dir: &Path,
    route_ids: &[String],
) -> Result<HashMap<String, Vec<TripVariant>>, GtfsError> {
    let mut rdr = TableReader::open(data_dir, "trips.txt")?;
    let idx_trip = rdr.require_column("trip_id")?;
    let idx_dir = rdr.column("direction_id");
    let idx_headsign = rdr.column("trip_headsign");
    let groups = index::grouped_index(&mut rdr, "route_id")?;

    let mut trips = HashMap::new();
    for route_id in route_ids {
        let Some(records) = groups.get(route_id) else {
            continue;
        };
        let variants: Vec<TripVariant> = records
            .iter()
            .filter_map(|record| {
                let trip_id = record.get(idx_trip)?;
                if trip_id.is_empty() {
                    return None;
                }
                Some(TripVariant {
                    trip_id: trip_id.to_string(),
                    direction: normalize_direction(idx_dir.and_then(|i| record.get(i))),
                    headsign: idx_headsign.and_then(|i| record.get(i)).and_then(non_empty),
                })
            })
            .collect();
        if !variants.is_empty() {
            trips.insert(route_id.clone(), variants);
        }
    }
    Ok(trips)
}

/// First shape id carried by any trip of the route, in file order.
pub fn primary_shape_for_route(
    data_dir: &Path,
    route_id: &str,
) -> Result<Option<String>, GtfsError> {
    let mut rdr = TableReader::open(data_dir, "trips.txt")?;
    let idx_route = rdr.require_column("route_id")?;
    let Some(idx_shape) = rdr.column("shape_id") else {
        return Ok(None);
    };

    for result in rdr.records() {
        let record = result?;
        if record.get(idx_route).unwrap_or("") != route_id {
            continue;
        }
        if let Some(shape_id) = record.get(idx_shape).and_then(non_empty) {
            return Ok(Some(shape_id));
        }
    }
    Ok(None)
}
