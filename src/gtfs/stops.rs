use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;
use utoipa::ToSchema;

use super::error::GtfsError;
use super::index;
use super::reader::{non_empty, TableReader};

/// Stop row as served by the static dump.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StopRecord {
    pub stop_id: String,
    pub stop_code: Option<String>,
    pub stop_name: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub zone_id: Option<String>,
    pub location_type: Option<i32>,
    pub parent_station: Option<String>,
}

struct StopColumns {
    idx_code: Option<usize>,
    idx_name: Option<usize>,
    idx_lat: Option<usize>,
    idx_lon: Option<usize>,
    idx_zone: Option<usize>,
    idx_type: Option<usize>,
    idx_parent: Option<usize>,
}

impl StopColumns {
    fn resolve(rdr: &TableReader) -> Self {
        Self {
            idx_code: rdr.column("stop_code"),
            idx_name: rdr.column("stop_name"),
            idx_lat: rdr.column("stop_lat"),
            idx_lon: rdr.column("stop_lon"),
            idx_zone: rdr.column("zone_id"),
            idx_type: rdr.column("location_type"),
            idx_parent: rdr.column("parent_station"),
        }
    }

    fn record(&self, stop_id: String, record: &csv::StringRecord) -> StopRecord {
        StopRecord {
            stop_id,
            stop_code: self.idx_code.and_then(|i| record.get(i)).and_then(non_empty),
            stop_name: self.idx_name.and_then(|i| record.get(i)).and_then(non_empty),
            lat: self
                .idx_lat
                .and_then(|i| record.get(i))
                .and_then(|s| s.parse().ok()),
            lon: self
                .idx_lon
                .and_then(|i| record.get(i))
                .and_then(|s| s.parse().ok()),
            zone_id: self.idx_zone.and_then(|i| record.get(i)).and_then(non_empty),
            location_type: self
                .idx_type
                .and_then(|i| record.get(i))
                .and_then(|s| s.parse().ok()),
            parent_station: self
                .idx_parent
                .and_then(|i| record.get(i))
                .and_then(non_empty),
        }
    }
}

/// Full stop dump in file order.
pub fn load_stop_records(data_dir: &Path) -> Result<Vec<StopRecord>, GtfsError> {
    let mut rdr = TableReader::open(data_dir, "stops.txt")?;
    let idx_id = rdr.require_column("stop_id")?;
    let cols = StopColumns::resolve(&rdr);

    let mut stops = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let stop_id = record.get(idx_id).unwrap_or("").to_string();
        if stop_id.is_empty() {
            skipped += 1;
            continue;
        }
        stops.push(cols.record(stop_id, &record));
    }
    if skipped > 0 {
        warn!(skipped, "Skipped stops.txt records with empty stop_id");
    }
    Ok(stops)
}

/// Whether stops.txt has a row for the id. Used to tell "stop with no
/// departures" apart from "no such stop".
pub fn stop_exists(data_dir: &Path, stop_id: &str) -> Result<bool, GtfsError> {
    let mut rdr = TableReader::open(data_dir, "stops.txt")?;
    let idx_id = rdr.require_column("stop_id")?;
    for result in rdr.records() {
        let record = result?;
        if record.get(idx_id).unwrap_or("") == stop_id {
            return Ok(true);
        }
    }
    Ok(false)
}

/// stop id -> stop row, for joining stop details onto a trip's stop list.
pub fn stop_details(data_dir: &Path) -> Result<HashMap<String, StopRecord>, GtfsError> {
    let mut rdr = TableReader::open(data_dir, "stops.txt")?;
    let cols = StopColumns::resolve(&rdr);
    let raw = index::unique_index(&mut rdr, "stop_id")?;

    Ok(raw
        .into_iter()
        .map(|(stop_id, record)| {
            let detail = cols.record(stop_id.clone(), &record);
            (stop_id, detail)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("stops.txt"),
            "stop_id,stop_code,stop_name,stop_lat,stop_lon,location_type,parent_station,zone_id\n\
             S1,1001,Central Station,32.0853,34.7818,0,,Z1\n\
             S2,1002,Harbor,32.1000,34.9000,,,\n\
             ,9999,Ghost,0,0,,,\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_stop_dump_fields_and_order() {
        let dir = fixture_dir();
        let stops = load_stop_records(dir.path()).unwrap();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0].stop_id, "S1");
        assert_eq!(stops[0].stop_name.as_deref(), Some("Central Station"));
        assert_eq!(stops[0].lat, Some(32.0853));
        assert_eq!(stops[0].location_type, Some(0));
        assert_eq!(stops[0].zone_id.as_deref(), Some("Z1"));
        // S2 leaves its optional fields empty
        assert_eq!(stops[1].location_type, None);
        assert_eq!(stops[1].parent_station, None);
    }

    #[test]
    fn test_stop_details_keyed_by_id() {
        let dir = fixture_dir();
        let details = stop_details(dir.path()).unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details["S2"].stop_name.as_deref(), Some("Harbor"));
    }

    #[test]
    fn test_stop_exists() {
        let dir = fixture_dir();
        assert!(stop_exists(dir.path(), "S1").unwrap());
        assert!(!stop_exists(dir.path(), "S404").unwrap());
    }
}
