use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use super::CachedData;

const EXTENSION: &str = "json";

/// Persisted tier: one pretty-printed JSON file per cache key.
///
/// There is no size cap; entries only disappear through `remove`/`clear`.
#[derive(Debug, Clone)]
pub struct DiskTier {
    cache_dir: PathBuf,
}

/// Only the timestamp of a cache file, for cheap age reporting.
#[derive(Deserialize)]
struct Stamp {
    cached_at: DateTime<Utc>,
}

impl DiskTier {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)
            .with_context(|| format!("Failed to create cache directory: {}", cache_dir.display()))?;
        Ok(Self { cache_dir })
    }

    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.{}", name, EXTENSION))
    }

    pub async fn load<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        let contents = match fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read cache file: {}", name));
            }
        };

        let cached: CachedData<T> = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse cache file: {}", name))?;

        Ok(Some(cached))
    }

    /// Write through a temporary file so readers never see a partial file.
    pub async fn save<T: Serialize>(&self, name: &str, cached: &CachedData<T>) -> Result<()> {
        let path = self.cache_path(name);
        let tmp = self.cache_dir.join(format!("{}.{}.tmp", name, EXTENSION));
        let contents = serde_json::to_string_pretty(cached)?;

        fs::create_dir_all(&self.cache_dir).await?;
        fs::write(&tmp, contents)
            .await
            .with_context(|| format!("Failed to write cache file: {}", name))?;
        fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("Failed to move cache file into place: {}", name))?;
        debug!(cache = name, "Saved disk cache entry");
        Ok(())
    }

    pub async fn remove(&self, name: &str) -> Result<bool> {
        match fs::remove_file(self.cache_path(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("Failed to remove cache file: {}", name)),
        }
    }

    async fn entry_paths(&self) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();
        let mut dir = match fs::read_dir(&self.cache_dir).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(paths),
            Err(e) => return Err(e).context("Failed to list cache directory"),
        };

        while let Some(entry) = dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(EXTENSION) {
                paths.push(path);
            }
        }
        Ok(paths)
    }

    /// Delete every cache file, returning how many were removed.
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for path in self.entry_paths().await? {
            fs::remove_file(&path)
                .await
                .with_context(|| format!("Failed to remove cache file: {}", path.display()))?;
            removed += 1;
        }
        Ok(removed)
    }

    pub async fn len(&self) -> Result<usize> {
        Ok(self.entry_paths().await?.len())
    }

    /// Timestamp of the most recently written entry, if any.
    pub async fn newest(&self) -> Result<Option<DateTime<Utc>>> {
        let mut newest = None;
        for path in self.entry_paths().await? {
            let contents = match fs::read_to_string(&path).await {
                Ok(contents) => contents,
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unreadable cache file");
                    continue;
                }
            };
            match serde_json::from_str::<Stamp>(&contents) {
                Ok(stamp) => {
                    if newest.map(|n| stamp.cached_at > n).unwrap_or(true) {
                        newest = Some(stamp.cached_at);
                    }
                }
                Err(e) => {
                    debug!(path = %path.display(), error = %e, "Skipping unparsable cache file")
                }
            }
        }
        Ok(newest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tier = DiskTier::new(dir.path().join("cache")).expect("disk tier");

        assert!(tier.load::<Vec<i32>>("missing").await.expect("load").is_none());

        let stamp = Utc::now() - Duration::minutes(61);
        tier.save("numbers", &CachedData::new(vec![1, 2, 3], stamp))
            .await
            .expect("save");

        let loaded = tier.load::<Vec<i32>>("numbers").await.expect("load").expect("present");
        assert_eq!(loaded.data, vec![1, 2, 3]);
        assert_eq!(loaded.cached_at, stamp);
        assert_eq!(tier.len().await.expect("len"), 1);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tier = DiskTier::new(dir.path().to_path_buf()).expect("disk tier");
        std::fs::write(dir.path().join("broken.json"), "{not json").expect("write");

        assert!(tier.load::<Vec<i32>>("broken").await.is_err());
    }

    #[tokio::test]
    async fn test_clear_and_newest() {
        let dir = tempfile::tempdir().expect("tempdir");
        let tier = DiskTier::new(dir.path().to_path_buf()).expect("disk tier");
        let older = Utc::now() - Duration::hours(2);
        let newer = Utc::now() - Duration::minutes(5);

        tier.save("a", &CachedData::new(1, older)).await.expect("save");
        tier.save("b", &CachedData::new(2, newer)).await.expect("save");
        std::fs::write(dir.path().join("notes.txt"), "keep").expect("write");

        assert_eq!(tier.newest().await.expect("newest"), Some(newer));
        assert_eq!(tier.clear().await.expect("clear"), 2);
        assert_eq!(tier.len().await.expect("len"), 0);
        assert!(dir.path().join("notes.txt").exists());
        assert!(!tier.remove("a").await.expect("remove"));
    }
}
