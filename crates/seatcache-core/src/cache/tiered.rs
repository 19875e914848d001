use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::{
    cache_key, CacheEntry, CacheSource, CachedData, Clock, DiskTier, MemoryTier, SystemClock,
};
use crate::config::CacheConfig;
use crate::models::{PlayerMatch, Table, TableStats};
use crate::source::{SourceError, TableSource, WriteOutcome};

/// Per-read options. `force_refresh` skips both tiers but is not part of
/// the cache key; `room` is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    pub force_refresh: bool,
    pub room: Option<String>,
}

impl ReadOptions {
    pub fn forced() -> Self {
        Self {
            force_refresh: true,
            room: None,
        }
    }

    pub fn with_room(mut self, room: impl Into<String>) -> Self {
        self.room = Some(room.into());
        self
    }

    fn key_fragment(&self) -> String {
        match self.room.as_deref().map(str::trim) {
            Some(room) if !room.is_empty() => format!("room={}", room),
            _ => "all".to_string(),
        }
    }

    fn filter(&self, tables: Vec<Table>) -> Vec<Table> {
        match self.room.as_deref().map(str::trim) {
            Some(room) if !room.is_empty() => tables
                .into_iter()
                .filter(|t| t.room.eq_ignore_ascii_case(room))
                .collect(),
            _ => tables,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClearScope {
    Memory,
    Disk,
    All,
}

impl FromStr for ClearScope {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(ClearScope::Memory),
            "disk" => Ok(ClearScope::Disk),
            "all" => Ok(ClearScope::All),
            other => Err(format!("unknown cache scope '{}' (expected memory, disk or all)", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheInfo {
    pub cache_dir: PathBuf,
    pub memory_entries: usize,
    pub search_entries: usize,
    pub stats_entries: usize,
    pub disk_entries: usize,
    pub newest_disk_entry: Option<DateTime<Utc>>,
    /// Human-readable age of `newest_disk_entry`, e.g. "5m ago".
    pub newest_disk_age: Option<String>,
}

/// A table set held in memory.
///
/// The memory tier's own `cached_at` decides freshness there; `fetched_at`
/// is when the data actually left the remote and is what callers see.
#[derive(Debug, Clone)]
struct Snapshot {
    tables: Vec<Table>,
    fetched_at: DateTime<Utc>,
}

impl Snapshot {
    fn into_cached(self) -> CachedData<Vec<Table>> {
        CachedData::new(self.tables, self.fetched_at)
    }
}

#[derive(Debug, Clone, Copy)]
struct Ttls {
    memory: Duration,
    disk: Duration,
    search: Duration,
    stats: Duration,
}

/// Memory, then disk, then the remote source.
pub struct TieredCache {
    source: Arc<dyn TableSource>,
    default_range: String,
    ttls: Ttls,
    tables: RwLock<MemoryTier<Snapshot>>,
    searches: RwLock<MemoryTier<Vec<PlayerMatch>>>,
    stats: RwLock<MemoryTier<TableStats>>,
    disk: DiskTier,
    clock: Arc<dyn Clock>,
}

impl TieredCache {
    pub fn new(
        source: Arc<dyn TableSource>,
        config: &CacheConfig,
        cache_dir: PathBuf,
        default_range: impl Into<String>,
    ) -> Result<Self> {
        let capacity = config.memory_capacity;
        Ok(Self {
            source,
            default_range: default_range.into(),
            ttls: Ttls {
                memory: config.memory_ttl(),
                disk: config.disk_ttl(),
                search: config.search_ttl(),
                stats: config.stats_ttl(),
            },
            tables: RwLock::new(MemoryTier::new(capacity)),
            searches: RwLock::new(MemoryTier::new(capacity)),
            stats: RwLock::new(MemoryTier::new(capacity)),
            disk: DiskTier::new(cache_dir)?,
            clock: Arc::new(SystemClock),
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub fn default_range(&self) -> &str {
        &self.default_range
    }

    /// Read the table set for `range` (default range when `None`).
    ///
    /// A remote failure is only surfaced when no disk snapshot exists; any
    /// snapshot, however old, is served tagged `stale` instead.
    pub async fn get(
        &self,
        range: Option<&str>,
        options: &ReadOptions,
    ) -> Result<CacheEntry<Vec<Table>>, SourceError> {
        let range = range.unwrap_or(&self.default_range);
        let key = cache_key(&self.source.identity(), range, &options.key_fragment());

        if !options.force_refresh {
            let now = self.now();
            let memory_hit = self
                .tables
                .read()
                .await
                .get(&key)
                .filter(|cached| cached.is_fresh(self.ttls.memory, now))
                .map(|cached| cached.data.clone());
            if let Some(snapshot) = memory_hit {
                debug!(key = %key, "Memory cache hit");
                return Ok(CacheEntry::hit(snapshot.into_cached(), CacheSource::Memory, key));
            }

            match self.disk.load::<Vec<Table>>(&key).await {
                Ok(Some(cached)) if cached.is_fresh(self.ttls.disk, now) => {
                    debug!(key = %key, age = %cached.age_display(now), "Disk cache hit");
                    let stamp = self.memory_stamp(cached.cached_at, now);
                    self.remember(&key, &cached, stamp).await;
                    return Ok(CacheEntry::hit(cached, CacheSource::Disk, key));
                }
                Ok(_) => {}
                Err(e) => warn!(key = %key, error = %e, "Failed to read disk cache"),
            }
        }

        match self.source.fetch_tables(range).await {
            Ok(tables) => {
                let tables = options.filter(tables);
                let cached = CachedData::new(tables, self.now());
                info!(key = %key, tables = cached.data.len(), "Refreshed tables from remote");

                self.remember(&key, &cached, cached.cached_at).await;
                if let Err(e) = self.disk.save(&key, &cached).await {
                    warn!(key = %key, error = %e, "Failed to write disk cache");
                }
                Ok(CacheEntry::fresh(cached.data, cached.cached_at, key))
            }
            Err(err) => match self.stale_fallback(&key).await {
                Some(cached) => {
                    warn!(
                        key = %key,
                        error = %err,
                        age = %cached.age_display(self.now()),
                        "Remote fetch failed, serving stale data"
                    );
                    Ok(CacheEntry::stale(cached, key, err.to_string()))
                }
                None => Err(err),
            },
        }
    }

    /// Memory-tier timestamp for data promoted from disk: fresh for up to the
    /// memory TTL from now, but never past the disk entry's own expiry.
    fn memory_stamp(&self, fetched_at: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
        let to_chrono = |ttl: Duration| {
            ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::zero())
        };
        let lifetime = to_chrono(self.ttls.disk) - to_chrono(self.ttls.memory);
        fetched_at
            .checked_add_signed(lifetime)
            .map(|latest| latest.min(now))
            .unwrap_or(fetched_at)
    }

    async fn remember(&self, key: &str, cached: &CachedData<Vec<Table>>, stamp: DateTime<Utc>) {
        let snapshot = Snapshot {
            tables: cached.data.clone(),
            fetched_at: cached.cached_at,
        };
        let evicted = self
            .tables
            .write()
            .await
            .insert(key.to_string(), CachedData::new(snapshot, stamp));
        if !evicted.is_empty() {
            debug!(evicted = evicted.len(), "Evicted memory cache entries");
        }
    }

    /// Disk snapshot regardless of age, else whatever expired copy memory
    /// still holds.
    async fn stale_fallback(&self, key: &str) -> Option<CachedData<Vec<Table>>> {
        match self.disk.load::<Vec<Table>>(key).await {
            Ok(Some(cached)) => return Some(cached),
            Ok(None) => {}
            Err(e) => warn!(key = %key, error = %e, "Failed to read disk cache for fallback"),
        }
        self.tables
            .read()
            .await
            .get(key)
            .map(|cached| cached.data.clone().into_cached())
    }

    /// Players whose name contains `name`, case-insensitively.
    pub async fn search_player(
        &self,
        name: &str,
        options: &ReadOptions,
    ) -> Result<CacheEntry<Vec<PlayerMatch>>, SourceError> {
        let fragment = format!("{}|{}", options.key_fragment(), name.trim().to_lowercase());
        let key = cache_key(&self.source.identity(), "search", &fragment);

        if !options.force_refresh {
            let now = self.now();
            let hit = self
                .searches
                .read()
                .await
                .get(&key)
                .filter(|cached| cached.is_fresh(self.ttls.search, now))
                .cloned();
            if let Some(cached) = hit {
                debug!(key = %key, "Search cache hit");
                return Ok(CacheEntry::hit(cached, CacheSource::Memory, key));
            }
        }

        let tables = self.get(None, options).await?;
        let matches = PlayerMatch::search(&tables.data, name);
        if !tables.stale {
            self.searches
                .write()
                .await
                .insert(key.clone(), CachedData::new(matches.clone(), self.now()));
        }
        Ok(tables.derive(matches, key))
    }

    pub async fn stats(
        &self,
        options: &ReadOptions,
    ) -> Result<CacheEntry<TableStats>, SourceError> {
        let key = cache_key(&self.source.identity(), "stats", &options.key_fragment());

        if !options.force_refresh {
            let now = self.now();
            let hit = self
                .stats
                .read()
                .await
                .get(&key)
                .filter(|cached| cached.is_fresh(self.ttls.stats, now))
                .cloned();
            if let Some(cached) = hit {
                debug!(key = %key, "Stats cache hit");
                return Ok(CacheEntry::hit(cached, CacheSource::Memory, key));
            }
        }

        let tables = self.get(None, options).await?;
        let stats = TableStats::from_tables(&tables.data);
        if !tables.stale {
            self.stats
                .write()
                .await
                .insert(key.clone(), CachedData::new(stats.clone(), self.now()));
        }
        Ok(tables.derive(stats, key))
    }

    /// Drop cached entries, returning how many were removed.
    pub async fn clear(&self, scope: ClearScope) -> Result<usize> {
        let mut removed = 0;
        if matches!(scope, ClearScope::Memory | ClearScope::All) {
            removed += self.tables.write().await.clear();
            removed += self.searches.write().await.clear();
            removed += self.stats.write().await.clear();
        }
        if matches!(scope, ClearScope::Disk | ClearScope::All) {
            removed += self.disk.clear().await?;
        }
        info!(scope = ?scope, removed, "Cleared cache");
        Ok(removed)
    }

    /// Write through the source, then invalidate everything so the next
    /// read observes the write.
    pub async fn write(&self, tables: &[Table]) -> Result<WriteOutcome, SourceError> {
        let outcome = self.source.write_tables(tables).await?;
        if let Err(e) = self.clear(ClearScope::All).await {
            warn!(error = %e, "Failed to clear cache after write");
        }
        Ok(outcome)
    }

    pub async fn info(&self) -> Result<CacheInfo> {
        let newest = self.disk.newest().await?;
        let now = self.now();
        Ok(CacheInfo {
            cache_dir: self.disk.dir().to_path_buf(),
            memory_entries: self.tables.read().await.len(),
            search_entries: self.searches.read().await.len(),
            stats_entries: self.stats.read().await.len(),
            disk_entries: self.disk.len().await?,
            newest_disk_entry: newest,
            newest_disk_age: newest.map(|at| CachedData::new((), at).age_display(now)),
        })
    }
}
