use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A value plus the moment it was fetched. This is also the on-disk format.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T, cached_at: DateTime<Utc>) -> Self {
        Self { data, cached_at }
    }

    pub fn age_minutes(&self, now: DateTime<Utc>) -> i64 {
        (now - self.cached_at).num_minutes()
    }

    /// Valid while `now - cached_at < ttl`. Entries from the future (clock
    /// skew) count as fresh.
    pub fn is_fresh(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        let age = now - self.cached_at;
        match age.to_std() {
            Ok(age) => age < ttl,
            Err(_) => true,
        }
    }

    pub fn age_display(&self, now: DateTime<Utc>) -> String {
        let minutes = self.age_minutes(now);
        if minutes < 1 {
            "just now".to_string()
        } else if minutes < 60 {
            format!("{}m ago", minutes)
        } else if minutes < 1440 {
            let hours = minutes / 60;
            let remaining_mins = minutes % 60;
            if remaining_mins >= 30 {
                // Round up: 1h 30m+ becomes 2h
                format!("{}h ago", hours + 1)
            } else {
                format!("{}h ago", hours)
            }
        } else {
            let days = minutes / 1440;
            let remaining_hours = (minutes % 1440) / 60;
            if remaining_hours >= 12 {
                format!("{}d ago", days + 1)
            } else {
                format!("{}d ago", days)
            }
        }
    }
}

/// Which tier answered a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheSource {
    Memory,
    Disk,
    Remote,
    Stale,
}

impl std::fmt::Display for CacheSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CacheSource::Memory => write!(f, "memory"),
            CacheSource::Disk => write!(f, "disk"),
            CacheSource::Remote => write!(f, "remote"),
            CacheSource::Stale => write!(f, "stale"),
        }
    }
}

/// The answer to a cache read.
///
/// `stale` entries come from an expired disk snapshot after the remote
/// failed; `error` then holds the failure so callers can decide whether old
/// data is acceptable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub source: CacheSource,
    pub cached: bool,
    pub timestamp: DateTime<Utc>,
    pub key: String,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stale: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> CacheEntry<T> {
    pub fn hit(cached: CachedData<T>, source: CacheSource, key: String) -> Self {
        Self {
            data: cached.data,
            source,
            cached: true,
            timestamp: cached.cached_at,
            key,
            stale: false,
            error: None,
        }
    }

    pub fn fresh(data: T, timestamp: DateTime<Utc>, key: String) -> Self {
        Self {
            data,
            source: CacheSource::Remote,
            cached: false,
            timestamp,
            key,
            stale: false,
            error: None,
        }
    }

    pub fn stale(cached: CachedData<T>, key: String, error: String) -> Self {
        Self {
            data: cached.data,
            source: CacheSource::Stale,
            cached: true,
            timestamp: cached.cached_at,
            key,
            stale: true,
            error: Some(error),
        }
    }

    /// Carry this entry's provenance over to a derived value.
    pub fn derive<U>(&self, data: U, key: String) -> CacheEntry<U> {
        CacheEntry {
            data,
            source: self.source,
            cached: self.cached,
            timestamp: self.timestamp,
            key,
            stale: self.stale,
            error: self.error.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    #[test]
    fn test_cached_data_age_display() {
        let now = Utc::now();
        let at = |minutes: i64| CachedData::new(vec![1], now - ChronoDuration::minutes(minutes));

        assert_eq!(at(0).age_display(now), "just now");
        assert_eq!(at(-5).age_display(now), "just now");
        assert_eq!(at(5).age_display(now), "5m ago");
        assert_eq!(at(89).age_display(now), "1h ago");
        assert_eq!(at(90).age_display(now), "2h ago");
        assert_eq!(at(1440 + 11 * 60).age_display(now), "1d ago");
        assert_eq!(at(1440 + 12 * 60).age_display(now), "2d ago");
    }

    #[test]
    fn test_is_fresh_boundary() {
        let now = Utc::now();
        let ttl = Duration::from_secs(300);
        let at = |secs: i64| CachedData::new((), now - ChronoDuration::seconds(secs));

        assert!(at(299).is_fresh(ttl, now));
        assert!(!at(300).is_fresh(ttl, now));
        assert!(!at(301).is_fresh(ttl, now));
        assert!(at(-10).is_fresh(ttl, now));
    }

    #[test]
    fn test_entry_serialization_omits_fresh_markers() {
        let entry = CacheEntry::fresh(vec![1], Utc::now(), "k".to_string());
        let value = serde_json::to_value(&entry).expect("serialize entry");
        assert_eq!(value["source"], "remote");
        assert!(value.get("stale").is_none());
        assert!(value.get("error").is_none());
    }
}
