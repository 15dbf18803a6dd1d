//! Repository index client.
//!
//! The package repository is a plain HTTP endpoint: `GET <repo_url>/index.php`
//! returns a JSON array of package descriptors, and each descriptor's
//! `package` URL points at a downloadable zip. Plugins and themes use the
//! same index shape, optionally served from distinct base URLs.
//!
//! # Fail-soft contract
//!
//! Update discovery is a background concern and must never break a command
//! that merely reads the list. Every failure mode degrades to an empty
//! descriptor list rather than an error: unset repository URL, network
//! failure, non-200 status, unparseable JSON, or an index that is not an
//! array. Individual entries that fail to parse are skipped while their
//! siblings survive.
//!
//! # Index sanitation
//!
//! Repository indexes have been observed with corrupted entries whose name
//! or version embeds a stray `$` or `/i'` fragment. Such entries are
//! dropped, and all string fields are trimmed before use. A cached index
//! that still contains corrupted entries is treated as poisoned and
//! refetched.

pub mod installed;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::FileCache;
use crate::constants::{
    CACHE_KEY_PLUGIN_INDEX, CACHE_KEY_THEME_INDEX, INDEX_CACHE_TTL_SECS, INDEX_ENDPOINT,
    INDEX_FETCH_TIMEOUT, USER_AGENT,
};
use crate::core::PackageKind;

/// One entry of the repository index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageDescriptor {
    pub slug: String,
    pub name: String,
    pub version: String,
    /// Absolute URL of the package zip.
    pub download_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info_url: Option<String>,
    /// Optional hex-encoded SHA-256 of the package zip.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl PackageDescriptor {
    /// Parse one raw index entry, applying trimming and corruption checks.
    ///
    /// Returns `None` for entries that are structurally wrong or carry
    /// corrupted name/version fields.
    fn from_index_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;

        let field = |key: &str| -> Option<String> {
            obj.get(key).and_then(Value::as_str).map(|s| s.trim().to_string())
        };
        let optional = |key: &str| -> Option<String> {
            field(key).filter(|s| !s.is_empty())
        };

        let slug = field("slug")?;
        let name = field("name")?;
        let version = field("version")?;
        let download_url = field("package")?;

        if slug.is_empty() || name.is_empty() || version.is_empty() {
            return None;
        }
        if is_corrupted(&name) || is_corrupted(&version) {
            warn!("dropping corrupted index entry for slug '{slug}'");
            return None;
        }

        Some(Self {
            slug,
            name,
            version,
            download_url,
            description: optional("description"),
            changelog: optional("changelog"),
            info_url: optional("url"),
            checksum: optional("checksum"),
        })
    }

    fn is_corrupted_entry(&self) -> bool {
        is_corrupted(&self.name) || is_corrupted(&self.version)
    }
}

/// Detect the corruption signature seen in damaged repository indexes.
fn is_corrupted(field: &str) -> bool {
    field.contains('$') || field.contains("/i'")
}

/// Client for one repository index, with a TTL cache in front of it.
pub struct RegistryClient {
    base_url: String,
    kind: PackageKind,
    cache: FileCache,
    client: reqwest::Client,
}

impl RegistryClient {
    pub fn new(base_url: impl Into<String>, kind: PackageKind, cache: FileCache) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(INDEX_FETCH_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.into(),
            kind,
            cache,
            client,
        })
    }

    fn cache_key(&self) -> &'static str {
        match self.kind {
            PackageKind::Plugin => CACHE_KEY_PLUGIN_INDEX,
            PackageKind::Theme => CACHE_KEY_THEME_INDEX,
        }
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), INDEX_ENDPOINT)
    }

    /// All packages the repository currently offers.
    ///
    /// Serves from cache when a live entry exists and is clean; otherwise
    /// fetches, sanitizes, caches, and returns. Never fails: every error
    /// path yields an empty list.
    pub async fn available_packages(&self) -> Vec<PackageDescriptor> {
        if self.base_url.trim().is_empty() {
            debug!("{} repository URL is unset, skipping fetch", self.kind);
            return Vec::new();
        }

        if let Some(cached) = self.cache.get::<Vec<PackageDescriptor>>(self.cache_key()).await {
            // A cached index written before sanitation existed can still
            // carry corrupted entries. Drop it and refetch.
            if cached.iter().any(PackageDescriptor::is_corrupted_entry) {
                warn!("cached {} index contains corrupted entries, refetching", self.kind);
                let _ = self.cache.delete(self.cache_key()).await;
            } else {
                debug!("serving {} index from cache ({} entries)", self.kind, cached.len());
                return cached;
            }
        }

        let packages = self.fetch_index().await;
        if !packages.is_empty() {
            if let Err(e) = self
                .cache
                .set(self.cache_key(), &packages, Some(INDEX_CACHE_TTL_SECS))
                .await
            {
                warn!("failed to cache {} index: {e}", self.kind);
            }
        }
        packages
    }

    /// Look up a single package by slug.
    pub async fn find_package(&self, slug: &str) -> Option<PackageDescriptor> {
        self.available_packages()
            .await
            .into_iter()
            .find(|d| d.slug == slug)
    }

    /// Drop the cached index so the next read refetches.
    pub async fn invalidate(&self) -> Result<()> {
        self.cache.delete(self.cache_key()).await
    }

    async fn fetch_index(&self) -> Vec<PackageDescriptor> {
        let url = self.index_url();
        debug!("fetching {} index from {url}", self.kind);

        let response = match self.client.get(&url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("failed to reach repository index at {url}: {e}");
                return Vec::new();
            }
        };
        if !response.status().is_success() {
            warn!("repository index at {url} returned {}", response.status());
            return Vec::new();
        }

        let body: Value = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!("repository index at {url} is not valid JSON: {e}");
                return Vec::new();
            }
        };

        sanitize_index(&body)
    }
}

/// Turn a raw index document into clean descriptors.
///
/// Non-array documents yield nothing; malformed or corrupted entries are
/// skipped individually.
pub fn sanitize_index(body: &Value) -> Vec<PackageDescriptor> {
    let Some(entries) = body.as_array() else {
        warn!("repository index is not a JSON array");
        return Vec::new();
    };

    entries
        .iter()
        .filter_map(PackageDescriptor::from_index_value)
        .collect()
}

/// A sample index document, served by the `template` command so repository
/// operators have a known-good starting point.
pub const INDEX_TEMPLATE: &str = r#"[
  {
    "slug": "example-package",
    "name": "Example Package",
    "version": "1.0.0",
    "package": "https://packages.example.com/repo/example-package-1.0.0.zip",
    "description": "Short description shown in package listings.",
    "changelog": "1.0.0: initial release.",
    "url": "https://packages.example.com/example-package",
    "checksum": "optional hex sha-256 of the zip"
  }
]
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn entry(slug: &str, name: &str, version: &str) -> Value {
        json!({
            "slug": slug,
            "name": name,
            "version": version,
            "package": format!("https://r.example.com/{slug}-{version}.zip"),
        })
    }

    #[test]
    fn sanitize_keeps_clean_entries() {
        let body = json!([entry("alpha", "Alpha", "1.5"), entry("beta", "Beta", "2.0")]);
        let list = sanitize_index(&body);
        assert_eq!(list.len(), 2);
        assert_eq!(list[0].slug, "alpha");
        assert_eq!(list[1].version, "2.0");
    }

    #[test]
    fn sanitize_drops_corrupted_siblings_only() {
        // One damaged entry among three; the clean two must survive.
        let body = json!([
            entry("alpha", "Alpha", "1.5"),
            entry("broken", "Broken/i'", "1.0"),
            entry("gamma", "Gamma", "0.9$"),
        ]);
        let list = sanitize_index(&body);
        assert_eq!(list.iter().map(|d| d.slug.as_str()).collect::<Vec<_>>(), ["alpha"]);

        let body = json!([entry("a", "A", "1.0"), entry("bad", "B$", "1.0"), entry("c", "C", "1.0")]);
        let list = sanitize_index(&body);
        assert_eq!(list.len(), 2);
        assert!(list.iter().all(|d| d.slug != "bad"));
    }

    #[test]
    fn dollar_marker_is_dropped_and_apostrophes_survive() {
        let body = json!([
            entry("bad", "Bad $plugin", "1.0"),
            entry("obrien", "O'Brien's Tools", "1.0"),
        ]);
        let list = sanitize_index(&body);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].slug, "obrien");
        assert_eq!(list[0].name, "O'Brien's Tools");
    }

    #[test]
    fn sanitize_trims_fields() {
        let body = json!([entry("  spaced  ", "  Spaced Name ", " 1.2 ")]);
        let list = sanitize_index(&body);
        assert_eq!(list[0].slug, "spaced");
        assert_eq!(list[0].name, "Spaced Name");
        assert_eq!(list[0].version, "1.2");
    }

    #[test]
    fn sanitize_rejects_non_array_documents() {
        assert!(sanitize_index(&json!({"error": "maintenance"})).is_empty());
        assert!(sanitize_index(&json!("nope")).is_empty());
    }

    #[test]
    fn sanitize_skips_entries_missing_required_fields() {
        let body = json!([
            {"slug": "no-version", "name": "No Version", "package": "https://x/z.zip"},
            entry("ok", "Ok", "1.0"),
            {"slug": "", "name": "Empty Slug", "version": "1.0", "package": "https://x/z.zip"},
        ]);
        let list = sanitize_index(&body);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].slug, "ok");
    }

    #[tokio::test]
    async fn empty_repo_url_yields_empty_list() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());
        let client = RegistryClient::new("", PackageKind::Plugin, cache).unwrap();
        assert!(client.available_packages().await.is_empty());
    }

    #[tokio::test]
    async fn poisoned_cache_is_discarded() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());

        let poisoned = vec![PackageDescriptor {
            slug: "bad".to_string(),
            name: "Bad/i'".to_string(),
            version: "1.0".to_string(),
            download_url: String::new(),
            description: None,
            changelog: None,
            info_url: None,
            checksum: None,
        }];
        cache
            .set(CACHE_KEY_PLUGIN_INDEX, &poisoned, Some(3600))
            .await
            .unwrap();

        // Unreachable URL, so the refetch comes back empty rather than
        // serving the poisoned cache.
        let client =
            RegistryClient::new("http://127.0.0.1:1/repo", PackageKind::Plugin, cache.clone()).unwrap();
        assert!(client.available_packages().await.is_empty());
        assert_eq!(
            cache.get::<Vec<PackageDescriptor>>(CACHE_KEY_PLUGIN_INDEX).await,
            None
        );
    }

    #[tokio::test]
    async fn clean_cache_is_served_without_fetching() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path());

        let cached = sanitize_index(&json!([entry("alpha", "Alpha", "1.5")]));
        cache.set(CACHE_KEY_PLUGIN_INDEX, &cached, Some(3600)).await.unwrap();

        // The URL is unreachable; a hit proves the cache was used.
        let client = RegistryClient::new("http://127.0.0.1:1/repo", PackageKind::Plugin, cache).unwrap();
        assert_eq!(client.available_packages().await, cached);
    }

    #[test]
    fn index_template_is_valid() {
        let body: Value = serde_json::from_str(INDEX_TEMPLATE).unwrap();
        let list = sanitize_index(&body);
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].slug, "example-package");
    }
}
