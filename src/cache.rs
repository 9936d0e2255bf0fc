use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::gtfs::GtfsError;

const ARTIFACT_VERSION: u32 = 1;

static TEMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Artifact classes with distinct expiry policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Shapes and static route/stop dumps; changes only with the dataset
    Static,
    /// Computed departure boards
    Departures,
    /// Relayed realtime responses
    Realtime,
}

/// TTL per artifact class, in seconds.
#[derive(Debug, Clone, Copy)]
pub struct TtlTable {
    pub static_secs: u64,
    pub departures_secs: u64,
    pub realtime_secs: u64,
}

impl TtlTable {
    fn ttl_secs(&self, kind: ArtifactKind) -> u64 {
        match kind {
            ArtifactKind::Static => self.static_secs,
            ArtifactKind::Departures => self.departures_secs,
            ArtifactKind::Realtime => self.realtime_secs,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope {
    version: u32,
    created_at: i64,
    payload: serde_json::Value,
}

/// Keyed JSON artifact cache, one file per artifact. An entry whose age
/// reaches its class TTL reads as absent; unreadable or mismatching
/// artifacts read as absent too. Writes serialize into a uniquely named
/// temp file and rename it over the target, so a concurrent reader sees
/// either the old or the new artifact, never a torn one, and concurrent
/// writers settle last-one-wins. There is no invalidation, only expiry.
pub struct CacheStore {
    dir: PathBuf,
    ttls: TtlTable,
}

impl CacheStore {
    pub fn new(dir: &Path, ttls: TtlTable) -> Result<Self, GtfsError> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            ttls,
        })
    }

    pub fn get<T: DeserializeOwned>(&self, kind: ArtifactKind, key: &str) -> Option<T> {
        self.get_at(kind, key, Utc::now())
    }

    pub fn put<T: Serialize>(
        &self,
        kind: ArtifactKind,
        key: &str,
        value: &T,
    ) -> Result<(), GtfsError> {
        self.put_at(kind, key, value, Utc::now())
    }

    /// Number of artifact files currently on disk, fresh or not.
    pub fn entry_count(&self) -> usize {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return 0;
        };
        entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "json"))
            .count()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn get_at<T: DeserializeOwned>(
        &self,
        kind: ArtifactKind,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<T> {
        let path = self.artifact_path(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(key, error = %e, "Failed reading cache artifact");
                return None;
            }
        };
        let envelope: Envelope = match serde_json::from_str(&raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(key, error = %e, "Discarding unparsable cache artifact");
                return None;
            }
        };
        if envelope.version != ARTIFACT_VERSION {
            debug!(key, version = envelope.version, "Discarding cache artifact from another version");
            return None;
        }
        let age = now.timestamp() - envelope.created_at;
        if age < 0 || age >= self.ttls.ttl_secs(kind) as i64 {
            debug!(key, age, "Cache artifact expired");
            return None;
        }
        match serde_json::from_value(envelope.payload) {
            Ok(value) => {
                debug!(key, age, "Cache hit");
                Some(value)
            }
            Err(e) => {
                warn!(key, error = %e, "Cache artifact payload does not deserialize");
                None
            }
        }
    }

    fn put_at<T: Serialize>(
        &self,
        kind: ArtifactKind,
        key: &str,
        value: &T,
        now: DateTime<Utc>,
    ) -> Result<(), GtfsError> {
        let envelope = Envelope {
            version: ARTIFACT_VERSION,
            created_at: now.timestamp(),
            payload: serde_json::to_value(value)?,
        };
        let serialized = serde_json::to_string(&envelope)?;

        let path = self.artifact_path(key);
        let temp = path.with_extension(format!(
            "json.{}.{}.tmp",
            std::process::id(),
            TEMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        fs::write(&temp, serialized)?;
        if let Err(e) = fs::rename(&temp, &path) {
            let _ = fs::remove_file(&temp);
            return Err(e.into());
        }
        debug!(key, kind = ?kind, "Cached artifact");
        Ok(())
    }

    fn artifact_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_key(key)))
    }
}

/// Keys embed caller-supplied ids; anything outside a filename-safe
/// alphabet becomes '_' so a key can never escape the cache directory.
fn sanitize_key(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
