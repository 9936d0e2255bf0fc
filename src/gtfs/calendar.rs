use std::collections::HashSet;
use std::path::Path;

use chrono::{Datelike, NaiveDate};
use tracing::{debug, warn};

use super::error::GtfsError;
use super::reader::TableReader;

const WEEKDAY_COLUMNS: [&str; 7] = [
    "monday",
    "tuesday",
    "wednesday",
    "thursday",
    "friday",
    "saturday",
    "sunday",
];

/// Service ids operating on `date`: the weekday flag is set and the date
/// falls inside the inclusive start/end range. Dates are compared in their
/// 8-digit integer form; rows whose dates do not parse are skipped.
pub fn active_service_ids(
    data_dir: &Path,
    date: NaiveDate,
) -> Result<HashSet<String>, GtfsError> {
    let mut rdr = TableReader::open(data_dir, "calendar.txt")?;
    let idx_service = rdr.require_column("service_id")?;
    let idx_start = rdr.require_column("start_date")?;
    let idx_end = rdr.require_column("end_date")?;
    let idx_weekdays: Vec<usize> = WEEKDAY_COLUMNS
        .iter()
        .map(|column| rdr.require_column(column))
        .collect::<Result<_, _>>()?;
    let idx_today = idx_weekdays[date.weekday().num_days_from_monday() as usize];

    let today = date.year() as u32 * 10_000 + date.month() * 100 + date.day();
    let mut active = HashSet::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let service_id = record.get(idx_service).unwrap_or("");
        if service_id.is_empty() {
            skipped += 1;
            continue;
        }
        if record.get(idx_today).unwrap_or("") != "1" {
            continue;
        }
        let start: Option<u32> = record.get(idx_start).and_then(|s| s.trim().parse().ok());
        let end: Option<u32> = record.get(idx_end).and_then(|s| s.trim().parse().ok());
        match (start, end) {
            (Some(start), Some(end)) => {
                if start <= today && today <= end {
                    active.insert(service_id.to_string());
                }
            }
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(skipped, "Skipped malformed calendar.txt rows");
    }
    debug!(date = %date, active = active.len(), "Resolved active services");
    Ok(active)
}

#[cfg(test)]
mod tests {
    use super::*;

    // 2025-06-02 is a Monday
    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("calendar.txt"),
            "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
             WK,1,1,1,1,1,0,0,20250101,20251231\n\
             SAT,0,0,0,0,0,1,0,20250101,20251231\n\
             OLD,1,1,1,1,1,1,1,20240101,20250101\n\
             ONEDAY,1,0,0,0,0,0,0,20250602,20250602\n\
             BAD,1,1,1,1,1,1,1,2025x101,20251231\n",
        )
        .unwrap();
        dir
    }

    #[test]
    fn test_active_services_on_monday() {
        let dir = fixture_dir();
        let active = active_service_ids(dir.path(), monday()).unwrap();
        assert!(active.contains("WK"));
        assert!(active.contains("ONEDAY"));
        assert!(!active.contains("SAT"), "weekday flag not set");
        assert!(!active.contains("OLD"), "validity range ended");
        assert!(!active.contains("BAD"), "malformed start date");
    }

    #[test]
    fn test_range_boundaries_inclusive() {
        let dir = fixture_dir();
        // last day of the OLD range is still active (a Wednesday)
        let jan1 = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let active = active_service_ids(dir.path(), jan1).unwrap();
        assert!(active.contains("OLD"));
        assert!(active.contains("WK"));
    }

    #[test]
    fn test_no_active_services_is_empty_set() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("calendar.txt"),
            "service_id,monday,tuesday,wednesday,thursday,friday,saturday,sunday,start_date,end_date\n\
             WK,0,0,0,0,0,0,0,20250101,20251231\n",
        )
        .unwrap();
        assert!(active_service_ids(dir.path(), monday()).unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = active_service_ids(dir.path(), monday()).unwrap_err();
        assert!(matches!(err, GtfsError::DataFileMissing { .. }));
    }
}
