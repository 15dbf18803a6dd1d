//! Global constants used throughout the packup codebase.
//!
//! Timeouts, cache lifetimes, and protocol strings that are shared by
//! multiple modules. Defining them centrally keeps the magic numbers
//! discoverable.

use std::time::Duration;

/// Repository base URL used when no custom URL has been configured.
pub const DEFAULT_REPO_URL: &str = "https://marrisonlab.com/wp-repo/";

/// Path of the index document relative to the repository base URL.
///
/// The endpoint name is fixed by existing repository deployments and is
/// not configurable.
pub const INDEX_ENDPOINT: &str = "index.php";

/// Timeout for repository index fetches (15 seconds).
pub const INDEX_FETCH_TIMEOUT: Duration = Duration::from_secs(15);

/// How long a fetched repository index stays valid (6 hours).
pub const INDEX_CACHE_TTL_SECS: u64 = 6 * 60 * 60;

/// Timeout for GitHub API requests during self-update checks (10 seconds).
pub const GITHUB_TIMEOUT: Duration = Duration::from_secs(10);

/// How long a fetched self-update version stays valid (6 hours).
pub const SELF_VERSION_TTL_SECS: u64 = 6 * 60 * 60;

/// GitHub organisation that hosts packup releases.
pub const GITHUB_OWNER: &str = "marrisonlab";

/// GitHub repository that hosts packup releases.
pub const GITHUB_REPO: &str = "packup";

/// User-Agent header sent on all outbound HTTP requests.
///
/// GitHub rejects anonymous requests without one.
pub const USER_AGENT: &str = concat!("packup/", env!("CARGO_PKG_VERSION"));

/// Suffix shared by every backup archive filename.
pub const BACKUP_SUFFIX: &str = "-backup.zip";

/// Cache key for the plugin repository index.
pub const CACHE_KEY_PLUGIN_INDEX: &str = "available_updates";

/// Cache key for the theme repository index.
pub const CACHE_KEY_THEME_INDEX: &str = "available_theme_updates";

/// Cache key for the persisted available-update counter.
pub const CACHE_KEY_OUTDATED_COUNT: &str = "available_count";
