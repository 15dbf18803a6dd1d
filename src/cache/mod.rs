//! File-backed cache with per-entry expiry.
//!
//! Each entry is a small JSON file under the cache directory, holding the
//! serialized value together with an optional absolute expiry time. Reads of
//! expired entries delete the file and report a miss, so callers only ever
//! see live data.
//!
//! Cached values are treated as disposable. Every mutating operation in the
//! crate (install, update, restore) deletes the index keys it may have
//! invalidated, forcing the next read to refetch.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

#[derive(Debug, Serialize, Deserialize)]
struct CacheRecord<T> {
    value: T,
    expires_at: Option<DateTime<Utc>>,
}

/// A directory of JSON cache entries keyed by name.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    /// Fetch a cached value, or `None` on a miss.
    ///
    /// An entry that exists but is expired or fails to deserialize counts
    /// as a miss and is removed. Stale or corrupt data must never be
    /// served, so both cases degrade to "not cached".
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let path = self.entry_path(key);
        let raw = tokio::fs::read_to_string(&path).await.ok()?;

        let record: CacheRecord<T> = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(e) => {
                warn!("discarding unreadable cache entry {}: {}", path.display(), e);
                let _ = tokio::fs::remove_file(&path).await;
                return None;
            }
        };

        if let Some(expires_at) = record.expires_at {
            if Utc::now() >= expires_at {
                debug!("cache entry '{key}' expired");
                let _ = tokio::fs::remove_file(&path).await;
                return None;
            }
        }

        Some(record.value)
    }

    /// Store a value, optionally expiring after `ttl_secs` seconds.
    pub async fn set<T: Serialize>(&self, key: &str, value: &T, ttl_secs: Option<u64>) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("failed to create cache directory: {}", self.dir.display()))?;

        let expires_at = ttl_secs.map(|secs| Utc::now() + Duration::seconds(secs as i64));
        let record = CacheRecord { value, expires_at };
        let json = serde_json::to_string_pretty(&record).context("failed to serialize cache entry")?;

        let path = self.entry_path(key);
        tokio::fs::write(&path, json)
            .await
            .with_context(|| format!("failed to write cache entry: {}", path.display()))?;
        Ok(())
    }

    /// Remove a single entry. Missing entries are not an error.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let path = self.entry_path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove cache entry: {}", path.display())),
        }
    }

    /// Remove every entry in the cache directory.
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("failed to read cache directory: {}", self.dir.display()));
            }
        };

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                tokio::fs::remove_file(&path)
                    .await
                    .with_context(|| format!("failed to remove cache entry: {}", path.display()))?;
                removed += 1;
            }
        }
        Ok(removed)
    }
}
