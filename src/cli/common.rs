//! Shared state and helpers for command implementations.

use std::path::Path;

use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};

use crate::cache::FileCache;
use crate::config::GlobalConfig;
use crate::core::PackageKind;
use crate::installer::Installer;
use crate::registry::RegistryClient;

/// Everything a subcommand needs: loaded config, the cache, and display
/// preferences.
pub struct CommandContext {
    pub config: GlobalConfig,
    /// Where the config was (or would be) loaded from, for saving back.
    pub config_path: std::path::PathBuf,
    pub cache: FileCache,
    pub no_progress: bool,
}

impl CommandContext {
    pub async fn load(config_path: Option<&Path>, no_progress: bool) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => GlobalConfig::default_path()?,
        };
        let config = GlobalConfig::load_from(&config_path).await?;
        // The cache lives alongside the config file, so isolated runs
        // with an explicit config stay isolated.
        let cache_dir = config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("cache");
        Ok(Self {
            config,
            config_path,
            cache: FileCache::new(cache_dir),
            no_progress,
        })
    }

    pub fn installer(&self) -> Result<Installer> {
        Installer::new(self.config.clone(), self.cache.clone())
    }

    pub fn registry(&self, kind: PackageKind) -> Result<RegistryClient> {
        let base_url = match kind {
            PackageKind::Plugin => self.config.repo.url.clone(),
            PackageKind::Theme => self.config.repo.themes_url().to_string(),
        };
        RegistryClient::new(base_url, kind, self.cache.clone())
    }

    pub fn package_root(&self, kind: PackageKind) -> &Path {
        match kind {
            PackageKind::Plugin => &self.config.paths.plugins_dir,
            PackageKind::Theme => &self.config.paths.themes_dir,
        }
    }

    /// A progress bar over `total` items, or a hidden one with
    /// `--no-progress`.
    pub fn progress_bar(&self, total: u64) -> ProgressBar {
        if self.no_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template("{spinner:.green} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar
    }
}
