use std::fs::File;
use std::path::Path;

use super::error::GtfsError;

/// Cleans one header cell: drops the UTF-8 byte-order mark and zero-width
/// spaces that real GTFS exports carry, then trims surrounding whitespace.
pub fn normalize_header(raw: &str) -> String {
    raw.replace(['\u{FEFF}', '\u{200B}'], "").trim().to_string()
}

pub(crate) fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Single-pass reader over one file of the dataset. Headers are normalized
/// once at open; data rows stay positionally aligned to the source file.
/// Not restartable; reopen for a fresh scan.
#[derive(Debug)]
pub struct TableReader {
    file: String,
    rdr: csv::Reader<File>,
    headers: Vec<String>,
}

impl TableReader {
    pub fn open(data_dir: &Path, file: &str) -> Result<Self, GtfsError> {
        let path = data_dir.join(file);
        if !path.is_file() {
            return Err(GtfsError::DataFileMissing {
                file: file.to_string(),
            });
        }
        let handle = File::open(&path).map_err(|e| GtfsError::DataFileUnreadable {
            file: file.to_string(),
            message: e.to_string(),
        })?;
        // GTFS rows are frequently ragged; short rows become missing fields,
        // not reader errors.
        let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(handle);
        let headers: Vec<String> = rdr
            .headers()
            .map_err(|e| GtfsError::DataFileUnreadable {
                file: file.to_string(),
                message: e.to_string(),
            })?
            .iter()
            .map(normalize_header)
            .collect();
        if headers.is_empty() || headers.iter().all(|h| h.is_empty()) {
            return Err(GtfsError::MalformedHeader {
                file: file.to_string(),
            });
        }
        Ok(Self {
            file: file.to_string(),
            rdr,
            headers,
        })
    }

    pub fn file(&self) -> &str {
        &self.file
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Case-insensitive column lookup against the normalized header.
    pub fn column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
    }

    pub fn require_column(&self, name: &str) -> Result<usize, GtfsError> {
        self.column(name)
            .ok_or_else(|| GtfsError::RequiredColumnMissing {
                file: self.file.clone(),
                column: name.to_string(),
            })
    }

    /// Lazy row stream. A read error mid-file surfaces as DataFileUnreadable.
    pub fn records(
        &mut self,
    ) -> impl Iterator<Item = Result<csv::StringRecord, GtfsError>> + '_ {
        let file = self.file.clone();
        self.rdr.records().map(move |result| {
            result.map_err(|e| GtfsError::DataFileUnreadable {
                file: file.clone(),
                message: e.to_string(),
            })
        })
    }
}
