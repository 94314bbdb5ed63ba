//! Configuration loading for Wayfare.
//!
//! Every section is optional in the TOML file; missing sections and fields
//! fall back to [`WayfareConfig::default`], which points at the public
//! OpenStreetMap services.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::ConfigError;

/// Environment variable holding the config file path.
pub const CONFIG_ENV_VAR: &str = "WAYFARE_CONFIG";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WayfareConfig {
    pub cache: CacheSection,
    pub nominatim: NominatimSection,
    pub overpass: OverpassSection,
    pub resolver: ResolverSection,
    pub candidates: CandidatesSection,
    pub boundary: BoundarySection,
    pub telemetry: TelemetrySection,
}

/// Which chunk store backs the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    #[default]
    Memory,
    Lmdb,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSection {
    pub store: StoreKind,
    pub lmdb_path: Option<PathBuf>,
    pub lmdb_map_size_mb: usize,
    /// Overrides the store's key size limit.
    pub max_key_bytes: Option<usize>,
    /// Overrides the store's per-chunk payload limit.
    pub max_payload_bytes: Option<usize>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            store: StoreKind::Memory,
            lmdb_path: None,
            lmdb_map_size_mb: 256,
            max_key_bytes: None,
            max_payload_bytes: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NominatimSection {
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout_ms: u64,
    pub min_interval_ms: u64,
}

impl Default for NominatimSection {
    fn default() -> Self {
        Self {
            base_url: "https://nominatim.openstreetmap.org".to_string(),
            user_agent: default_user_agent(),
            request_timeout_ms: 10_000,
            min_interval_ms: 1_000,
        }
    }
}

impl NominatimSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn min_interval(&self) -> Duration {
        Duration::from_millis(self.min_interval_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OverpassSection {
    pub base_url: String,
    pub user_agent: String,
    pub request_timeout_ms: u64,
}

impl Default for OverpassSection {
    fn default() -> Self {
        Self {
            base_url: "https://overpass-api.de/api".to_string(),
            user_agent: default_user_agent(),
            request_timeout_ms: 30_000,
        }
    }
}

impl OverpassSection {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ResolverSection {
    /// Pause between successive query variants.
    pub variant_delay_ms: u64,
    pub ttl_hours: u64,
}

impl Default for ResolverSection {
    fn default() -> Self {
        Self {
            variant_delay_ms: 1_000,
            ttl_hours: 48,
        }
    }
}

impl ResolverSection {
    pub fn variant_delay(&self) -> Duration {
        Duration::from_millis(self.variant_delay_ms)
    }

    pub fn ttl(&self) -> Duration {
        hours(self.ttl_hours)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CandidatesSection {
    pub ttl_hours: u64,
    pub country_area_ttl_hours: u64,
}

impl Default for CandidatesSection {
    fn default() -> Self {
        Self {
            ttl_hours: 24,
            country_area_ttl_hours: 24 * 30,
        }
    }
}

impl CandidatesSection {
    pub fn ttl(&self) -> Duration {
        hours(self.ttl_hours)
    }

    pub fn country_area_ttl(&self) -> Duration {
        hours(self.country_area_ttl_hours)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BoundarySection {
    pub ttl_hours: u64,
}

impl Default for BoundarySection {
    fn default() -> Self {
        Self { ttl_hours: 24 * 30 }
    }
}

impl BoundarySection {
    pub fn ttl(&self) -> Duration {
        hours(self.ttl_hours)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TelemetrySection {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set.
    pub filter: String,
    pub json: bool,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            filter: "wayfare=info".to_string(),
            json: false,
        }
    }
}

fn default_user_agent() -> String {
    format!("wayfare/{} (travel planning)", env!("CARGO_PKG_VERSION"))
}

fn hours(count: u64) -> Duration {
    Duration::from_secs(count.saturating_mul(3600))
}

impl WayfareConfig {
    /// Load from `--config <path>` or `WAYFARE_CONFIG`, then validate.
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but falls back to defaults when no path is given.
    pub fn load_or_default() -> Result<Self, ConfigError> {
        match Self::load() {
            Err(ConfigError::MissingConfigPath) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: WayfareConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_non_empty("nominatim.base_url", &self.nominatim.base_url)?;
        require_non_empty("nominatim.user_agent", &self.nominatim.user_agent)?;
        require_positive("nominatim.request_timeout_ms", self.nominatim.request_timeout_ms)?;
        require_non_empty("overpass.base_url", &self.overpass.base_url)?;
        require_non_empty("overpass.user_agent", &self.overpass.user_agent)?;
        require_positive("overpass.request_timeout_ms", self.overpass.request_timeout_ms)?;
        require_positive("resolver.ttl_hours", self.resolver.ttl_hours)?;
        require_positive("candidates.ttl_hours", self.candidates.ttl_hours)?;
        require_positive(
            "candidates.country_area_ttl_hours",
            self.candidates.country_area_ttl_hours,
        )?;
        require_positive("boundary.ttl_hours", self.boundary.ttl_hours)?;

        if self.cache.store == StoreKind::Lmdb {
            let missing = self
                .cache
                .lmdb_path
                .as_ref()
                .map(|p| p.as_os_str().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::InvalidValue {
                    field: "cache.lmdb_path",
                    reason: "required when store = \"lmdb\"".to_string(),
                });
            }
            if self.cache.lmdb_map_size_mb == 0 {
                return Err(ConfigError::InvalidValue {
                    field: "cache.lmdb_map_size_mb",
                    reason: "must be > 0".to_string(),
                });
            }
        }
        if self.cache.max_key_bytes == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "cache.max_key_bytes",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.max_payload_bytes == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "cache.max_payload_bytes",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }
}

fn require_non_empty(field: &'static str, value: &str) -> Result<(), ConfigError> {
    if value.trim().is_empty() {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must not be empty".to_string(),
        });
    }
    Ok(())
}

fn require_positive(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::InvalidValue {
            field,
            reason: "must be > 0".to_string(),
        });
    }
    Ok(())
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var(CONFIG_ENV_VAR).ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}
