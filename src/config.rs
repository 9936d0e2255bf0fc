use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Address the HTTP server binds to.
    #[serde(default = "Config::default_bind_addr")]
    pub bind_addr: String,
    /// Directory holding the unpacked GTFS dataset (routes.txt, trips.txt, ...).
    #[serde(default = "Config::default_data_dir")]
    pub data_dir: PathBuf,
    /// Directory for cached resolution artifacts. Created on startup.
    #[serde(default = "Config::default_cache_dir")]
    pub cache_dir: PathBuf,
    /// IANA timezone the dataset's service days are anchored to.
    #[serde(default = "Config::default_timezone")]
    pub timezone: String,
    /// Allowed CORS origins. Ignored when cors_permissive is true.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Allow all origins. Defaults to true; the API serves a public map.
    #[serde(default = "Config::default_cors_permissive")]
    pub cors_permissive: bool,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub departures: DeparturesConfig,
    #[serde(default)]
    pub simplify: SimplifyConfig,
    /// Upstream SIRI stop-monitoring feed. The /api/realtime passthrough
    /// answers 503 when this section is absent.
    #[serde(default)]
    pub realtime: Option<RealtimeConfig>,
}

/// Cache TTLs per artifact class, in seconds.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Shapes and static route/stop dumps (default: 86400, one day)
    #[serde(default = "CacheConfig::default_static_ttl_secs")]
    pub static_ttl_secs: u64,
    /// Computed departure boards (default: 3600, one hour)
    #[serde(default = "CacheConfig::default_departures_ttl_secs")]
    pub departures_ttl_secs: u64,
    /// Relayed realtime responses (default: 60)
    #[serde(default = "CacheConfig::default_realtime_ttl_secs")]
    pub realtime_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            static_ttl_secs: Self::default_static_ttl_secs(),
            departures_ttl_secs: Self::default_departures_ttl_secs(),
            realtime_ttl_secs: Self::default_realtime_ttl_secs(),
        }
    }
}

impl CacheConfig {
    fn default_static_ttl_secs() -> u64 {
        86_400
    }
    fn default_departures_ttl_secs() -> u64 {
        3_600
    }
    fn default_realtime_ttl_secs() -> u64 {
        60
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeparturesConfig {
    /// How many minutes into the past a departure stays listed (default: 30).
    /// Riders who just missed a bus still want to see it.
    #[serde(default = "DeparturesConfig::default_grace_minutes")]
    pub grace_minutes: i64,
}

impl Default for DeparturesConfig {
    fn default() -> Self {
        Self {
            grace_minutes: Self::default_grace_minutes(),
        }
    }
}

impl DeparturesConfig {
    fn default_grace_minutes() -> i64 {
        30
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SimplifyConfig {
    /// Perpendicular-distance tolerance in degrees used when the request
    /// does not supply one (default: 0.0001, roughly 11 m).
    #[serde(default = "SimplifyConfig::default_tolerance")]
    pub default_tolerance: f64,
}

impl Default for SimplifyConfig {
    fn default() -> Self {
        Self {
            default_tolerance: Self::default_tolerance(),
        }
    }
}

impl SimplifyConfig {
    fn default_tolerance() -> f64 {
        0.0001
    }
}

/// Upstream SIRI-SM endpoint relayed by /api/realtime.
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    pub base_url: String,
    pub api_key: String,
    /// Upstream request timeout in seconds (default: 10)
    #[serde(default = "RealtimeConfig::default_timeout_secs")]
    pub timeout_secs: u64,
    /// SIRI StopVisitDetailLevel parameter (default: "calls")
    #[serde(default = "RealtimeConfig::default_detail_level")]
    pub detail_level: String,
    /// SIRI PreviewInterval parameter (default: "PT30M")
    #[serde(default = "RealtimeConfig::default_preview_interval")]
    pub preview_interval: String,
}

impl RealtimeConfig {
    fn default_timeout_secs() -> u64 {
        10
    }
    fn default_detail_level() -> String {
        "calls".to_string()
    }
    fn default_preview_interval() -> String {
        "PT30M".to_string()
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::ReadError(e.to_string()))?;

        serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }

    /// Parses the configured timezone name.
    pub fn tz(&self) -> Result<chrono_tz::Tz, ConfigError> {
        self.timezone
            .parse()
            .map_err(|_| ConfigError::InvalidTimezone(self.timezone.clone()))
    }

    fn default_bind_addr() -> String {
        "0.0.0.0:3000".to_string()
    }
    fn default_data_dir() -> PathBuf {
        PathBuf::from("gtfs-data")
    }
    fn default_cache_dir() -> PathBuf {
        PathBuf::from("gtfs-cache")
    }
    fn default_timezone() -> String {
        "Asia/Jerusalem".to_string()
    }
    fn default_cors_permissive() -> bool {
        true
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: Self::default_bind_addr(),
            data_dir: Self::default_data_dir(),
            cache_dir: Self::default_cache_dir(),
            timezone: Self::default_timezone(),
            cors_origins: Vec::new(),
            cors_permissive: Self::default_cors_permissive(),
            cache: CacheConfig::default(),
            departures: DeparturesConfig::default(),
            simplify: SimplifyConfig::default(),
            realtime: None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),
    #[error("Failed to parse config: {0}")]
    ParseError(String),
    #[error("Unknown timezone: {0}")]
    InvalidTimezone(String),
}
