use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, warn};

use super::error::GtfsError;

/// Ordered `[lat, lon]` points of one shape, scanned straight off shapes.txt.
///
/// shapes.txt is by far the largest dataset file, so no index is built: rows
/// are matched with a cheap `"<shapeId>,"` prefix comparison (the trailing
/// delimiter keeps shape id "12" from matching "123") and their fields are
/// read positionally: shape_id, shape_pt_lat, shape_pt_lon,
/// shape_pt_sequence. Rows whose lat/lon/sequence fail to parse are skipped.
/// The matches are stably sorted by sequence number; ties keep file order.
/// No matching rows is an empty result, not an error.
pub fn extract_points(data_dir: &Path, shape_id: &str) -> Result<Vec<[f64; 2]>, GtfsError> {
    let path = data_dir.join("shapes.txt");
    if !path.is_file() {
        return Err(GtfsError::DataFileMissing {
            file: "shapes.txt".into(),
        });
    }
    let file = File::open(&path).map_err(|e| GtfsError::DataFileUnreadable {
        file: "shapes.txt".into(),
        message: e.to_string(),
    })?;
    let mut reader = BufReader::with_capacity(1 << 16, file);

    let prefix = format!("{shape_id},");
    let mut matched: Vec<(i64, [f64; 2])> = Vec::new();
    let mut skipped = 0usize;
    let mut line = String::new();
    loop {
        line.clear();
        let read = reader
            .read_line(&mut line)
            .map_err(|e| GtfsError::DataFileUnreadable {
                file: "shapes.txt".into(),
                message: e.to_string(),
            })?;
        if read == 0 {
            break;
        }
        if !line.starts_with(&prefix) {
            continue;
        }
        let mut fields = line.trim_end().split(',');
        fields.next(); // shape_id, already matched
        let lat = fields.next().and_then(|s| s.parse::<f64>().ok());
        let lon = fields.next().and_then(|s| s.parse::<f64>().ok());
        let sequence = fields.next().and_then(|s| s.parse::<i64>().ok());
        match (lat, lon, sequence) {
            (Some(lat), Some(lon), Some(sequence)) => matched.push((sequence, [lat, lon])),
            _ => skipped += 1,
        }
    }
    if skipped > 0 {
        warn!(shape_id, skipped, "Skipped malformed shapes.txt rows");
    }

    matched.sort_by_key(|(sequence, _)| *sequence);
    let points: Vec<[f64; 2]> = matched.into_iter().map(|(_, point)| point).collect();
    debug!(shape_id, points = points.len(), "Extracted shape points");
    Ok(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_shapes(content: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("shapes.txt"), content).unwrap();
        dir
    }

    #[test]
    fn test_points_are_sequence_ordered() {
        let dir = write_shapes(
            "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n\
             S1,32.10,34.80,3\n\
             S1,32.20,34.81,1\n\
             S1,32.30,34.82,2\n",
        );
        let points = extract_points(dir.path(), "S1").unwrap();
        assert_eq!(
            points,
            vec![[32.20, 34.81], [32.30, 34.82], [32.10, 34.80]]
        );
    }

    #[test]
    fn test_prefix_match_respects_delimiter() {
        let dir = write_shapes(
            "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n\
             12,32.10,34.80,1\n\
             123,31.00,35.00,1\n\
             12,32.11,34.81,2\n",
        );
        let points = extract_points(dir.path(), "12").unwrap();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0], [32.10, 34.80]);

        let points = extract_points(dir.path(), "123").unwrap();
        assert_eq!(points, vec![[31.00, 35.00]]);
    }

    #[test]
    fn test_malformed_rows_are_skipped() {
        let dir = write_shapes(
            "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n\
             S1,not-a-number,34.80,1\n\
             S1,32.20,34.81,2\n\
             S1,32.30,34.82\n",
        );
        let points = extract_points(dir.path(), "S1").unwrap();
        assert_eq!(points, vec![[32.20, 34.81]]);
    }

    #[test]
    fn test_sequence_ties_keep_file_order() {
        let dir = write_shapes(
            "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n\
             S1,1.0,1.0,5\n\
             S1,2.0,2.0,5\n\
             S1,0.0,0.0,1\n",
        );
        let points = extract_points(dir.path(), "S1").unwrap();
        assert_eq!(points, vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]);
    }

    #[test]
    fn test_unknown_shape_is_empty_not_error() {
        let dir = write_shapes("shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence\n");
        assert!(extract_points(dir.path(), "S1").unwrap().is_empty());
    }

    #[test]
    fn test_missing_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_points(dir.path(), "S1").unwrap_err();
        assert!(matches!(err, GtfsError::DataFileMissing { .. }));
    }

    #[test]
    fn test_crlf_and_extra_fields() {
        let dir = write_shapes(
            "shape_id,shape_pt_lat,shape_pt_lon,shape_pt_sequence,shape_dist_traveled\r\n\
             S1,32.10,34.80,2,10.5\r\nS1,32.00,34.70,1,0.0\r\n",
        );
        let points = extract_points(dir.path(), "S1").unwrap();
        assert_eq!(points, vec![[32.00, 34.70], [32.10, 34.80]]);
    }
}
