use std::collections::HashMap;
use std::path::Path;

use tracing::{debug, warn};

use super::error::GtfsError;
use super::reader::{non_empty, TableReader};

/// One trip's call at the queried stop.
#[derive(Debug, Clone)]
pub struct StopVisit {
    pub arrival_time: String,
    pub departure_time: Option<String>,
    pub stop_sequence: Option<i64>,
}

/// A stop along one trip.
#[derive(Debug, Clone)]
pub struct TripStop {
    pub stop_id: String,
    pub sequence: i64,
}

/// Scans stop_times.txt for every call at `stop_id`, keyed by trip id. When
/// one trip visits the stop more than once (loop routes), the later row
/// overwrites the earlier one and the overwrites are reported.
pub fn visits_at_stop(
    data_dir: &Path,
    stop_id: &str,
) -> Result<HashMap<String, StopVisit>, GtfsError> {
    let mut rdr = TableReader::open(data_dir, "stop_times.txt")?;
    let idx_trip = rdr.require_column("trip_id")?;
    let idx_stop = rdr.require_column("stop_id")?;
    let idx_arrival = rdr.require_column("arrival_time")?;
    let idx_departure = rdr.column("departure_time");
    let idx_sequence = rdr.column("stop_sequence");

    let mut visits: HashMap<String, StopVisit> = HashMap::new();
    let mut overwritten = 0usize;
    for result in rdr.records() {
        let record = result?;
        if record.get(idx_stop).unwrap_or("") != stop_id {
            continue;
        }
        let trip_id = record.get(idx_trip).unwrap_or("");
        if trip_id.is_empty() {
            continue;
        }
        let visit = StopVisit {
            arrival_time: record.get(idx_arrival).unwrap_or("").to_string(),
            departure_time: idx_departure.and_then(|i| record.get(i)).and_then(non_empty),
            stop_sequence: idx_sequence
                .and_then(|i| record.get(i))
                .and_then(|s| s.parse().ok()),
        };
        if visits.insert(trip_id.to_string(), visit).is_some() {
            overwritten += 1;
        }
    }
    if overwritten > 0 {
        warn!(
            stop_id,
            overwritten, "Trips visiting the stop more than once, kept the last call"
        );
    }
    debug!(stop_id, trips = visits.len(), "Scanned stop_times for stop");
    Ok(visits)
}

/// Ordered stops of one trip. Rows without a parsable stop_sequence are
/// skipped; ties keep file order.
pub fn stops_of_trip(data_dir: &Path, trip_id: &str) -> Result<Vec<TripStop>, GtfsError> {
    let mut rdr = TableReader::open(data_dir, "stop_times.txt")?;
    let idx_trip = rdr.require_column("trip_id")?;
    let idx_stop = rdr.require_column("stop_id")?;
    let idx_sequence = rdr.require_column("stop_sequence")?;

    let mut stops: Vec<TripStop> = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        if record.get(idx_trip).unwrap_or("") != trip_id {
            continue;
        }
        let stop_id = record.get(idx_stop).unwrap_or("");
        let sequence = record.get(idx_sequence).and_then(|s| s.parse().ok());
        match (stop_id.is_empty(), sequence) {
            (false, Some(sequence)) => stops.push(TripStop {
                stop_id: stop_id.to_string(),
                sequence,
            }),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(trip_id, skipped, "Skipped malformed stop_times.txt rows");
    }
    stops.sort_by_key(|s| s.sequence);
    Ok(stops)
}
