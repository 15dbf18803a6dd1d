//! Global configuration management.
//!
//! Configuration lives at `~/.packup/config.toml` and controls the
//! repository endpoints, the package roots, and backup behavior. The file
//! is optional: a missing file yields defaults, and every field has a
//! sensible default so partial files work too.
//!
//! The `PACKUP_CONFIG` environment variable overrides the config path,
//! which the test suite uses to isolate runs.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::DEFAULT_REPO_URL;

/// Top-level configuration, mirrored in `config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GlobalConfig {
    #[serde(default)]
    pub repo: RepoConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub backups: BackupConfig,

    #[serde(default)]
    pub upgrade: UpgradeConfig,
}

/// Repository endpoints for plugin and theme packages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepoConfig {
    /// Base URL of the plugin repository. The index is served from
    /// `<url>/index.php`. Empty disables repository lookups.
    #[serde(default = "default_repo_url")]
    pub url: String,

    /// Optional separate theme repository. Falls back to `url` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub themes_url: Option<String>,
}

impl Default for RepoConfig {
    fn default() -> Self {
        Self {
            url: default_repo_url(),
            themes_url: None,
        }
    }
}

impl RepoConfig {
    /// Effective theme repository base URL.
    pub fn themes_url(&self) -> &str {
        self.themes_url.as_deref().unwrap_or(&self.url)
    }
}

fn default_repo_url() -> String {
    DEFAULT_REPO_URL.to_string()
}

/// Filesystem roots for installed packages and working data.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
    /// Directory that holds installed plugins, one subdirectory each.
    #[serde(default = "default_plugins_dir")]
    pub plugins_dir: PathBuf,

    /// Directory that holds installed themes.
    #[serde(default = "default_themes_dir")]
    pub themes_dir: PathBuf,

    /// Where backup archives are written.
    #[serde(default = "default_backups_dir")]
    pub backups_dir: PathBuf,

    /// Scratch space for extracting downloaded archives.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            plugins_dir: default_plugins_dir(),
            themes_dir: default_themes_dir(),
            backups_dir: default_backups_dir(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

fn packup_home() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(".packup")
}

fn default_plugins_dir() -> PathBuf {
    packup_home().join("plugins")
}

fn default_themes_dir() -> PathBuf {
    packup_home().join("themes")
}

fn default_backups_dir() -> PathBuf {
    packup_home().join("backups")
}

fn default_scratch_dir() -> PathBuf {
    packup_home().join("scratch")
}

/// Backup behavior.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupConfig {
    /// Take a backup of the installed package before every update.
    #[serde(default = "default_true")]
    pub auto_backup: bool,

    /// Keep every timestamped backup. When false, only the most recent
    /// backup per package is retained and older ones are pruned.
    #[serde(default = "default_true")]
    pub keep_history: bool,
}

impl Default for BackupConfig {
    fn default() -> Self {
        Self {
            auto_backup: true,
            keep_history: true,
        }
    }
}

/// Self-update behavior for the `packup` binary itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpgradeConfig {
    /// Seconds between automatic release checks against GitHub.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,

    /// Back up the running executable before replacing it.
    #[serde(default = "default_true")]
    pub backup_before_upgrade: bool,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        Self {
            check_interval: default_check_interval(),
            backup_before_upgrade: true,
        }
    }
}

fn default_check_interval() -> u64 {
    crate::constants::SELF_VERSION_TTL_SECS
}

fn default_true() -> bool {
    true
}

impl GlobalConfig {
    /// Default config file path, honoring the `PACKUP_CONFIG` override.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("PACKUP_CONFIG") {
            return Ok(PathBuf::from(path));
        }
        Ok(packup_home().join("config.toml"))
    }

    /// Default cache directory, alongside the config file.
    pub fn default_cache_dir() -> Result<PathBuf> {
        Ok(Self::default_path()?
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(packup_home)
            .join("cache"))
    }

    /// Load from the default location, falling back to defaults when the
    /// file does not exist.
    pub async fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?).await
    }

    /// Load from an explicit path.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("no config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Save to the default location.
    pub async fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?).await
    }

    /// Save to an explicit path, creating parent directories as needed.
    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("failed to create config directory: {}", parent.display()))?;
        }

        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        tokio::fs::write(path, content)
            .await
            .with_context(|| format!("failed to write config file: {}", path.display()))?;
        Ok(())
    }
}
