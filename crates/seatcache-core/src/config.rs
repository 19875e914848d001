//! Configuration management.
//!
//! Configuration is stored at `~/.config/seatcache/config.json`. Every field
//! has a default, so a missing or partial file is fine. A handful of
//! environment variables override the file for deployment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "seatcache";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Sheet range holding the eight seating columns.
pub const DEFAULT_RANGE: &str = "Sheet1!A:H";

pub const DEFAULT_DIRECT_BASE_URL: &str = "https://sheets.googleapis.com";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub source: SourceConfig,
    pub cache: CacheConfig,
    pub poll: PollConfig,
    /// When set, logs are also written to daily files in this directory.
    pub log_dir: Option<PathBuf>,
}

/// Where the spreadsheet lives and how long to wait for it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Proxy script endpoint accepting `{action, range, data}` posts.
    pub proxy_url: Option<String>,
    /// Spreadsheet id for the direct API transport.
    pub spreadsheet_id: Option<String>,
    pub default_range: String,
    pub direct_base_url: String,
    pub request_timeout_secs: u64,
    pub proxy_timeout_secs: u64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            spreadsheet_id: None,
            default_range: DEFAULT_RANGE.to_string(),
            direct_base_url: DEFAULT_DIRECT_BASE_URL.to_string(),
            request_timeout_secs: 30,
            proxy_timeout_secs: 30,
        }
    }
}

impl SourceConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn proxy_timeout(&self) -> Duration {
        Duration::from_secs(self.proxy_timeout_secs)
    }

    /// Stable name of the backend, used as the cache key prefix.
    pub fn identity(&self) -> String {
        self.spreadsheet_id
            .clone()
            .or_else(|| self.proxy_url.clone())
            .unwrap_or_else(|| "unconfigured".to_string())
    }
}

/// TTLs and limits for the cache tiers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub memory_ttl_secs: u64,
    pub disk_ttl_secs: u64,
    pub search_ttl_secs: u64,
    pub stats_ttl_secs: u64,
    /// Maximum entries held by each in-memory tier.
    pub memory_capacity: usize,
    /// Overrides the platform cache directory.
    pub cache_dir: Option<PathBuf>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_ttl_secs: 5 * 60,
            disk_ttl_secs: 60 * 60,
            search_ttl_secs: 60,
            stats_ttl_secs: 2 * 60,
            memory_capacity: 50,
            cache_dir: None,
        }
    }
}

impl CacheConfig {
    pub fn memory_ttl(&self) -> Duration {
        Duration::from_secs(self.memory_ttl_secs)
    }

    pub fn disk_ttl(&self) -> Duration {
        Duration::from_secs(self.disk_ttl_secs)
    }

    pub fn search_ttl(&self) -> Duration {
        Duration::from_secs(self.search_ttl_secs)
    }

    pub fn stats_ttl(&self) -> Duration {
        Duration::from_secs(self.stats_ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    /// Seconds between change-detection ticks. Each tick may hit the remote
    /// on a cache miss, so keep this conservative.
    pub interval_secs: u64,
    pub force_refresh: bool,
    pub channel_capacity: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            force_refresh: false,
            channel_capacity: 64,
        }
    }
}

impl PollConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs.max(1))
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))
        } else {
            Ok(Self::default())
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Apply `SEATCACHE_*` environment overrides on top of the file values.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(url) = lookup("SEATCACHE_PROXY_URL") {
            self.source.proxy_url = Some(url);
        }
        if let Some(id) = lookup("SEATCACHE_SPREADSHEET_ID") {
            self.source.spreadsheet_id = Some(id);
        }
        if let Some(range) = lookup("SEATCACHE_RANGE") {
            self.source.default_range = range;
        }
        if let Some(dir) = lookup("SEATCACHE_CACHE_DIR") {
            self.cache.cache_dir = Some(PathBuf::from(dir));
        }
        if let Some(secs) = lookup("SEATCACHE_POLL_SECS") {
            match secs.parse() {
                Ok(secs) => self.poll.interval_secs = secs,
                Err(_) => warn!(value = %secs, "Ignoring invalid SEATCACHE_POLL_SECS"),
            }
        }
    }

    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(ref dir) = self.cache.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }
}
