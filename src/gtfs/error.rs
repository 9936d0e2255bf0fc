use thiserror::Error;

/// Engine error taxonomy. Fatal variants mean the dataset cannot answer the
/// request at all; no-match variants mean the dataset answered "nothing".
/// Callers map the two classes differently, see `is_no_match`.
#[derive(Debug, Error)]
pub enum GtfsError {
    #[error("GTFS file missing: {file}")]
    DataFileMissing { file: String },
    #[error("Failed reading {file}: {message}")]
    DataFileUnreadable { file: String, message: String },
    #[error("{file} has a missing or empty header row")]
    MalformedHeader { file: String },
    #[error("{file} is missing required column {column}")]
    RequiredColumnMissing { file: String, column: String },
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("No routes found for line {0}")]
    LineNotFound(String),
    #[error("No shapes found for line {0}")]
    NoShapesForLine(String),
    #[error("No shape points found for line {0}")]
    NoShapePoints(String),
    #[error("No shape found for route {0}")]
    NoShapeForRoute(String),
    #[error("No stop found with id {0}")]
    UnknownStop(String),
}

impl GtfsError {
    /// True for the "dataset answered nothing" class, which the HTTP layer
    /// reports as 404 rather than 500.
    pub fn is_no_match(&self) -> bool {
        matches!(
            self,
            GtfsError::LineNotFound(_)
                | GtfsError::NoShapesForLine(_)
                | GtfsError::NoShapePoints(_)
                | GtfsError::NoShapeForRoute(_)
                | GtfsError::UnknownStop(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_data_file_missing() {
        let err = GtfsError::DataFileMissing {
            file: "routes.txt".into(),
        };
        assert_eq!(err.to_string(), "GTFS file missing: routes.txt");
    }

    #[test]
    fn error_display_required_column_missing() {
        let err = GtfsError::RequiredColumnMissing {
            file: "routes.txt".into(),
            column: "route_short_name".into(),
        };
        assert_eq!(
            err.to_string(),
            "routes.txt is missing required column route_short_name"
        );
    }

    #[test]
    fn error_display_line_not_found() {
        let err = GtfsError::LineNotFound("60".into());
        assert_eq!(err.to_string(), "No routes found for line 60");
    }

    #[test]
    fn no_match_classification() {
        assert!(GtfsError::LineNotFound("60".into()).is_no_match());
        assert!(GtfsError::NoShapeForRoute("R1".into()).is_no_match());
        assert!(GtfsError::UnknownStop("ST9".into()).is_no_match());
        assert!(!GtfsError::DataFileMissing {
            file: "trips.txt".into()
        }
        .is_no_match());
        assert!(!GtfsError::MalformedHeader {
            file: "stops.txt".into()
        }
        .is_no_match());
    }

    #[test]
    fn error_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: GtfsError = io_err.into();
        assert!(err.to_string().contains("file not found"));
        assert!(matches!(err, GtfsError::IoError(_)));
    }
}
