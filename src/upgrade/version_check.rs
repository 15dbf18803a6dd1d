//! Cached release checking.
//!
//! Asking GitHub for the latest release on every invocation would be slow
//! and rate-limited, so the result is cached with a TTL (six hours by
//! default, configurable via `upgrade.check_interval`). `upgrade --check`
//! bypasses the cache with `force`.

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::FileCache;
use crate::version;

use super::self_updater::SelfUpdater;

const CACHE_KEY: &str = "self_version_check";

/// Cached outcome of one release check.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VersionCheckRecord {
    pub latest_version: String,
    pub current_version: String,
    pub checked_at: DateTime<Utc>,
    pub update_available: bool,
}

pub struct VersionChecker {
    cache: FileCache,
    current_version: String,
    check_interval: u64,
}

impl VersionChecker {
    pub fn new(cache: FileCache, current_version: &str, check_interval: u64) -> Self {
        Self {
            cache,
            current_version: current_version.to_string(),
            check_interval,
        }
    }

    /// Latest-version info, from cache when fresh, from GitHub otherwise.
    ///
    /// A cached record taken while a different binary version was running
    /// is stale regardless of age and is re-checked.
    pub async fn check(&self, force: bool) -> Result<VersionCheckRecord> {
        if !force {
            if let Some(record) = self.cache.get::<VersionCheckRecord>(CACHE_KEY).await {
                if record.current_version == self.current_version {
                    debug!("using cached release check from {}", record.checked_at);
                    return Ok(record);
                }
            }
        }
        self.check_now().await
    }

    /// Ask GitHub directly and refresh the cache.
    pub async fn check_now(&self) -> Result<VersionCheckRecord> {
        let updater = SelfUpdater::new(&self.current_version, false)?;
        let release = updater.latest_release().await?;

        let record = VersionCheckRecord {
            update_available: version::is_newer(&release.version, &self.current_version),
            latest_version: release.version,
            current_version: self.current_version.clone(),
            checked_at: Utc::now(),
        };
        self.cache.set(CACHE_KEY, &record, Some(self.check_interval)).await?;
        Ok(record)
    }

    pub async fn clear_cache(&self) -> Result<()> {
        self.cache.delete(CACHE_KEY).await
    }
}

/// One-line status string for `upgrade --status`.
pub fn format_version_info(record: &VersionCheckRecord) -> String {
    if record.update_available {
        format!(
            "packup {} (version {} is available)",
            record.current_version, record.latest_version
        )
    } else {
        format!("packup {} (up to date)", record.current_version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(current: &str, latest: &str) -> VersionCheckRecord {
        VersionCheckRecord {
            latest_version: latest.to_string(),
            current_version: current.to_string(),
            checked_at: Utc::now(),
            update_available: version::is_newer(latest, current),
        }
    }

    #[tokio::test]
    async fn fresh_cache_is_served_without_network() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path());
        cache.set(CACHE_KEY, &record("0.3.2", "0.4.0"), Some(3600)).await.unwrap();

        let checker = VersionChecker::new(cache, "0.3.2", 3600);
        let result = checker.check(false).await.unwrap();
        assert_eq!(result.latest_version, "0.4.0");
        assert!(result.update_available);
    }

    #[tokio::test]
    async fn cache_from_another_binary_version_is_ignored() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path());
        cache.set(CACHE_KEY, &record("0.3.0", "0.3.2"), Some(3600)).await.unwrap();

        // Running 0.3.2 now; the 0.3.0-era record must not be served, so
        // the check falls through to the network and fails offline.
        let checker = VersionChecker::new(cache, "0.3.2", 3600);
        assert!(checker.check(false).await.is_err());
    }

    #[tokio::test]
    async fn clear_cache_removes_the_record() {
        let tmp = TempDir::new().unwrap();
        let cache = FileCache::new(tmp.path());
        cache.set(CACHE_KEY, &record("0.3.2", "0.3.2"), Some(3600)).await.unwrap();

        let checker = VersionChecker::new(cache.clone(), "0.3.2", 3600);
        checker.clear_cache().await.unwrap();
        assert_eq!(cache.get::<VersionCheckRecord>(CACHE_KEY).await, None);
    }

    #[test]
    fn status_line_mentions_available_update() {
        let line = format_version_info(&record("0.3.2", "0.4.0"));
        assert!(line.contains("0.4.0"));
        assert!(line.contains("available"));

        let line = format_version_info(&record("0.3.2", "0.3.2"));
        assert!(line.contains("up to date"));
    }
}
