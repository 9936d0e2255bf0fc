use std::collections::HashMap;
use std::path::Path;

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use super::error::GtfsError;
use super::reader::{non_empty, TableReader};
use super::trips::normalize_direction;
use super::{calendar, routes, stop_times};

/// One scheduled departure from a stop.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Departure {
    pub trip_id: String,
    pub route_id: String,
    /// Rider-facing line number (route_short_name)
    pub line_number: Option<String>,
    /// Trip headsign, or the route's long name when the trip has none
    pub destination: Option<String>,
    /// Scheduled arrival, RFC 3339 in the dataset's local timezone
    pub scheduled_arrival: String,
    pub direction_id: String,
}

/// Parses a GTFS service time "HH:MM:SS" to seconds since midnight. Hours
/// may exceed 24 for post-midnight service of the same service day.
pub fn parse_gtfs_time(time_str: &str) -> Option<i32> {
    let parts: Vec<&str> = time_str.split(':').collect();
    if parts.len() != 3 {
        return None;
    }
    let hours: i32 = parts[0].trim().parse().ok()?;
    let minutes: i32 = parts[1].parse().ok()?;
    let seconds: i32 = parts[2].parse().ok()?;
    Some(hours * 3600 + minutes * 60 + seconds)
}

/// Anchors a service time to its service date in the given timezone. Times
/// of 24:00:00 and later land on the following calendar day.
pub fn service_time_to_local(
    seconds_since_midnight: i32,
    service_date: NaiveDate,
    tz: Tz,
) -> Option<DateTime<FixedOffset>> {
    let hours = seconds_since_midnight / 3600;
    let minutes = (seconds_since_midnight % 3600) / 60;
    let secs = seconds_since_midnight % 60;

    let (date, time) = if hours >= 24 {
        let next_day = service_date.succ_opt()?;
        let t = NaiveTime::from_hms_opt((hours - 24) as u32, minutes as u32, secs as u32)?;
        (next_day, t)
    } else {
        let t = NaiveTime::from_hms_opt(hours as u32, minutes as u32, secs as u32)?;
        (service_date, t)
    };

    let naive_dt = NaiveDateTime::new(date, time);
    tz.from_local_datetime(&naive_dt)
        .earliest()
        .map(|dt| dt.fixed_offset())
}

struct TripInfo {
    route_id: String,
    headsign: Option<String>,
    direction: String,
}

/// The full departure board of a stop for `now`'s service day, sorted by
/// scheduled arrival. Not window-filtered; callers apply `filter_recent`
/// so cached boards stay correct as time passes.
pub fn compute_departures(
    data_dir: &Path,
    stop_id: &str,
    now: DateTime<Tz>,
) -> Result<Vec<Departure>, GtfsError> {
    let tz = now.timezone();
    let service_date = now.date_naive();

    let active = calendar::active_service_ids(data_dir, service_date)?;
    if active.is_empty() {
        debug!(stop_id, date = %service_date, "No active services");
        return Ok(Vec::new());
    }

    let visits = stop_times::visits_at_stop(data_dir, stop_id)?;
    if visits.is_empty() {
        return Ok(Vec::new());
    }

    // Trips serving the stop today
    let mut rdr = TableReader::open(data_dir, "trips.txt")?;
    let idx_trip = rdr.require_column("trip_id")?;
    let idx_route = rdr.require_column("route_id")?;
    let idx_service = rdr.require_column("service_id")?;
    let idx_headsign = rdr.column("trip_headsign");
    let idx_dir = rdr.column("direction_id");

    let mut trips: HashMap<String, TripInfo> = HashMap::new();
    for result in rdr.records() {
        let record = result?;
        let trip_id = record.get(idx_trip).unwrap_or("");
        if !visits.contains_key(trip_id) {
            continue;
        }
        if !active.contains(record.get(idx_service).unwrap_or("")) {
            continue;
        }
        let route_id = record.get(idx_route).unwrap_or("");
        if route_id.is_empty() {
            continue;
        }
        trips.insert(
            trip_id.to_string(),
            TripInfo {
                route_id: route_id.to_string(),
                headsign: idx_headsign.and_then(|i| record.get(i)).and_then(non_empty),
                direction: normalize_direction(idx_dir.and_then(|i| record.get(i))),
            },
        );
    }

    let route_names = routes::route_name_lookup(data_dir)?;

    let mut board: Vec<(DateTime<FixedOffset>, Departure)> = Vec::new();
    for (trip_id, visit) in &visits {
        let Some(trip) = trips.get(trip_id) else {
            continue;
        };
        let Some(route) = route_names.get(&trip.route_id) else {
            continue;
        };
        let Some(seconds) = parse_gtfs_time(&visit.arrival_time) else {
            continue;
        };
        let Some(arrival) = service_time_to_local(seconds, service_date, tz) else {
            continue;
        };
        board.push((
            arrival,
            Departure {
                trip_id: trip_id.clone(),
                route_id: trip.route_id.clone(),
                line_number: route.short_name.clone(),
                destination: trip.headsign.clone().or_else(|| route.long_name.clone()),
                scheduled_arrival: arrival.to_rfc3339(),
                direction_id: trip.direction.clone(),
            },
        ));
    }
    board.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.trip_id.cmp(&b.1.trip_id)));

    debug!(stop_id, departures = board.len(), "Computed departure board");
    Ok(board.into_iter().map(|(_, d)| d).collect())
}

/// Keeps departures scheduled strictly after `reference_time` minus the
/// grace window. Unparsable times are kept.
pub fn filter_recent(
    departures: Vec<Departure>,
    reference_time: DateTime<Utc>,
    grace_minutes: i64,
) -> Vec<Departure> {
    let cutoff = reference_time - Duration::minutes(grace_minutes);
    departures
        .into_iter()
        .filter(|d| match DateTime::parse_from_rfc3339(&d.scheduled_arrival) {
            Ok(time) => time > cutoff,
            Err(_) => true,
        })
        .collect()
}
