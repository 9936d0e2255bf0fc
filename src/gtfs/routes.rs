use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;

use super::error::GtfsError;
use super::index;
use super::reader::{non_empty, TableReader};

/// One route matched by a rider-facing line number.
#[derive(Debug, Clone)]
pub struct LineRoute {
    pub route_id: String,
    pub route_long_name: Option<String>,
}

/// Route names keyed by route id, for the departure join.
#[derive(Debug, Clone)]
pub struct RouteName {
    pub short_name: Option<String>,
    pub long_name: Option<String>,
}

/// Route row as served by the static dump.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct RouteRecord {
    pub route_id: String,
    pub agency_id: Option<String>,
    pub agency_name: Option<String>,
    pub route_short_name: Option<String>,
    pub route_long_name: Option<String>,
    pub route_desc: Option<String>,
    pub route_type: Option<i32>,
    pub route_color: Option<String>,
}

/// Collects every route whose trimmed short name equals the trimmed input.
/// Exact string comparison; "060" and "60" are different lines. Result keeps
/// first-appearance order from the file, deduplicated by route id. An empty
/// result is a valid answer, not an error.
pub fn routes_for_line(data_dir: &Path, line: &str) -> Result<Vec<LineRoute>, GtfsError> {
    let wanted = line.trim();
    let mut rdr = TableReader::open(data_dir, "routes.txt")?;
    let idx_id = rdr.require_column("route_id")?;
    let idx_short = rdr.require_column("route_short_name")?;
    let idx_long = rdr.column("route_long_name");

    let mut matches: Vec<LineRoute> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        let short = record.get(idx_short).unwrap_or("").trim();
        if short != wanted {
            continue;
        }
        let route_id = record.get(idx_id).unwrap_or("");
        if route_id.is_empty() || matches.iter().any(|m| m.route_id == route_id) {
            continue;
        }
        matches.push(LineRoute {
            route_id: route_id.to_string(),
            route_long_name: idx_long.and_then(|i| record.get(i)).and_then(non_empty),
        });
    }
    debug!(line = wanted, matches = matches.len(), "Resolved routes for line");
    Ok(matches)
}

pub fn route_ids_for_line(data_dir: &Path, line: &str) -> Result<Vec<String>, GtfsError> {
    Ok(routes_for_line(data_dir, line)?
        .into_iter()
        .map(|r| r.route_id)
        .collect())
}

/// route id -> (short name, long name), for labelling departures.
pub fn route_name_lookup(data_dir: &Path) -> Result<HashMap<String, RouteName>, GtfsError> {
    let mut rdr = TableReader::open(data_dir, "routes.txt")?;
    let idx_short = rdr.column("route_short_name");
    let idx_long = rdr.column("route_long_name");
    let raw = index::unique_index(&mut rdr, "route_id")?;

    Ok(raw
        .into_iter()
        .map(|(route_id, record)| {
            let name = RouteName {
                short_name: idx_short.and_then(|i| record.get(i)).and_then(non_empty),
                long_name: idx_long.and_then(|i| record.get(i)).and_then(non_empty),
            };
            (route_id, name)
        })
        .collect())
}

/// Full route dump in file order, agency names joined in when agency.txt is
/// present.
pub fn load_route_records(data_dir: &Path) -> Result<Vec<RouteRecord>, GtfsError> {
    let agencies = agency_names(data_dir);

    let mut rdr = TableReader::open(data_dir, "routes.txt")?;
    let idx_id = rdr.require_column("route_id")?;
    let idx_agency = rdr.column("agency_id");
    let idx_short = rdr.column("route_short_name");
    let idx_long = rdr.column("route_long_name");
    let idx_desc = rdr.column("route_desc");
    let idx_type = rdr.column("route_type");
    let idx_color = rdr.column("route_color");

    let mut routes = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let route_id = record.get(idx_id).unwrap_or("").to_string();
        if route_id.is_empty() {
            skipped += 1;
            continue;
        }
        let agency_id = idx_agency.and_then(|i| record.get(i)).and_then(non_empty);
        let agency_name = agency_id
            .as_ref()
            .and_then(|id| agencies.get(id))
            .cloned();
        routes.push(RouteRecord {
            route_id,
            agency_id,
            agency_name,
            route_short_name: idx_short.and_then(|i| record.get(i)).and_then(non_empty),
            route_long_name: idx_long.and_then(|i| record.get(i)).and_then(non_empty),
            route_desc: idx_desc.and_then(|i| record.get(i)).and_then(non_empty),
            route_type: idx_type
                .and_then(|i| record.get(i))
                .and_then(|s| s.parse().ok()),
            route_color: idx_color.and_then(|i| record.get(i)).and_then(non_empty),
        });
    }
    if skipped > 0 {
        warn!(skipped, "Skipped routes.txt records with empty route_id");
    }
    Ok(routes)
}

/// agency id -> agency name. agency.txt is optional enrichment; any failure
/// degrades to an empty map.
fn agency_names(data_dir: &Path) -> HashMap<String, String> {
    let mut rdr = match TableReader::open(data_dir, "agency.txt") {
        Ok(rdr) => rdr,
        Err(GtfsError::DataFileMissing { .. }) => {
            debug!("agency.txt not present, route dump will omit agency names");
            return HashMap::new();
        }
        Err(e) => {
            warn!(error = %e, "agency.txt unreadable, route dump will omit agency names");
            return HashMap::new();
        }
    };
    let (idx_id, idx_name) = match (rdr.column("agency_id"), rdr.column("agency_name")) {
        (Some(id), Some(name)) => (id, name),
        _ => {
            warn!("agency.txt missing agency_id/agency_name columns");
            return HashMap::new();
        }
    };

    let mut names = HashMap::new();
    for result in rdr.records() {
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                warn!(error = %e, "Stopped reading agency.txt");
                break;
            }
        };
        let id = record.get(idx_id).unwrap_or("");
        let name = record.get(idx_name).unwrap_or("");
        if !id.is_empty() && !name.is_empty() {
            names.insert(id.to_string(), name.to_string());
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("routes.txt"),
            "route_id,agency_id,route_short_name,route_long_name,route_desc,route_type,route_color\n\
             R1,A1, 60 ,Central - Harbor,,3,FF0000\n\
             R2,A1,60,Harbor - Central,,3,\n\
             R3,A2,060,Other Line,,3,\n\
             R4,A9,61,Elsewhere,,2,00FF00\n",
        )
        .unwrap();
        std::fs::write(
            dir.path().join("agency.txt"),
            "agency_id,agency_name\nA1,Metro Bus\nA2,Regional\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_line_match_is_trimmed_exact() {
        let dir = fixture_dir();
        let ids = route_ids_for_line(dir.path(), " 60").unwrap();
        assert_eq!(ids, vec!["R1", "R2"]);
        // zero-padded variant is a different line
        let ids = route_ids_for_line(dir.path(), "060").unwrap();
        assert_eq!(ids, vec!["R3"]);
    }

    #[test]
    fn test_unknown_line_is_empty_not_error() {
        let dir = fixture_dir();
        let ids = route_ids_for_line(dir.path(), "999").unwrap();
        assert!(ids.is_empty());
    }

    #[test]
    fn test_routes_for_line_carries_long_name() {
        let dir = fixture_dir();
        let routes = routes_for_line(dir.path(), "60").unwrap();
        assert_eq!(routes[0].route_long_name.as_deref(), Some("Central - Harbor"));
        assert_eq!(routes[1].route_long_name.as_deref(), Some("Harbor - Central"));
    }

    #[test]
    fn test_route_dump_joins_agency_names() {
        let dir = fixture_dir();
        let routes = load_route_records(dir.path()).unwrap();
        assert_eq!(routes.len(), 4);
        assert_eq!(routes[0].agency_name.as_deref(), Some("Metro Bus"));
        assert_eq!(routes[0].route_type, Some(3));
        // A9 has no agency.txt row
        assert_eq!(routes[3].agency_name, None);
    }

    #[test]
    fn test_route_dump_without_agency_file() {
        let dir = fixture_dir();
        std::fs::remove_file(dir.path().join("agency.txt")).unwrap();
        let routes = load_route_records(dir.path()).unwrap();
        assert_eq!(routes.len(), 4);
        assert!(routes.iter().all(|r| r.agency_name.is_none()));
    }

    #[test]
    fn test_route_name_lookup() {
        let dir = fixture_dir();
        let names = route_name_lookup(dir.path()).unwrap();
        assert_eq!(names["R4"].short_name.as_deref(), Some("61"));
        assert_eq!(names["R4"].long_name.as_deref(), Some("Elsewhere"));
    }
}
