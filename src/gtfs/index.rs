use std::collections::HashMap;

use tracing::warn;

use super::error::GtfsError;
use super::reader::TableReader;

/// Folds the reader into a 1:1 map on `key_column`. Duplicate keys keep the
/// last row seen, matching how the upstream dataset is consumed elsewhere.
/// Rows with an empty key are skipped and counted.
pub fn unique_index(
    rdr: &mut TableReader,
    key_column: &str,
) -> Result<HashMap<String, csv::StringRecord>, GtfsError> {
    let idx_key = rdr.require_column(key_column)?;
    let file = rdr.file().to_string();

    let mut index = HashMap::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let key = record.get(idx_key).unwrap_or("");
        if key.is_empty() {
            skipped += 1;
            continue;
        }
        index.insert(key.to_string(), record);
    }
    if skipped > 0 {
        warn!(file = %file, skipped, "Skipped records with empty key field");
    }
    Ok(index)
}

/// Folds the reader into a 1:many map on `key_column`, appending rows in
/// file order under each key.
pub fn grouped_index(
    rdr: &mut TableReader,
    key_column: &str,
) -> Result<HashMap<String, Vec<csv::StringRecord>>, GtfsError> {
    let idx_key = rdr.require_column(key_column)?;
    let file = rdr.file().to_string();

    let mut index: HashMap<String, Vec<csv::StringRecord>> = HashMap::new();
    let mut skipped = 0usize;
    for result in rdr.records() {
        let record = result?;
        let key = record.get(idx_key).unwrap_or("");
        if key.is_empty() {
            skipped += 1;
            continue;
        }
        index.entry(key.to_string()).or_default().push(record);
    }
    if skipped > 0 {
        warn!(file = %file, skipped, "Skipped records with empty key field");
    }
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reader_for(dir: &tempfile::TempDir, name: &str, content: &str) -> TableReader {
        std::fs::write(dir.path().join(name), content).unwrap();
        TableReader::open(dir.path(), name).unwrap()
    }

    #[test]
    fn test_unique_index_last_write_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut rdr = reader_for(
            &dir,
            "stops.txt",
            "stop_id,stop_name\nS1,Old Name\nS2,Other\nS1,New Name\n",
        );
        let index = unique_index(&mut rdr, "stop_id").unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index["S1"].get(1), Some("New Name"));
    }

    #[test]
    fn test_unique_index_skips_empty_keys() {
        let dir = tempfile::tempdir().unwrap();
        let mut rdr = reader_for(&dir, "stops.txt", "stop_id,stop_name\n,Ghost\nS1,Real\n");
        let index = unique_index(&mut rdr, "stop_id").unwrap();
        assert_eq!(index.len(), 1);
        assert!(!index.contains_key(""));
    }

    #[test]
    fn test_grouped_index_preserves_file_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut rdr = reader_for(
            &dir,
            "trips.txt",
            "route_id,trip_id\nR1,T3\nR2,T9\nR1,T1\nR1,T2\n",
        );
        let index = grouped_index(&mut rdr, "route_id").unwrap();
        let trips: Vec<&str> = index["R1"].iter().map(|r| r.get(1).unwrap()).collect();
        assert_eq!(trips, vec!["T3", "T1", "T2"]);
        assert_eq!(index["R2"].len(), 1);
    }

    #[test]
    fn test_missing_key_column_fails() {
        let dir = tempfile::tempdir().unwrap();
        let mut rdr = reader_for(&dir, "trips.txt", "trip_id\nT1\n");
        let err = unique_index(&mut rdr, "route_id").unwrap_err();
        assert!(matches!(err, GtfsError::RequiredColumnMissing { .. }));
    }
}
