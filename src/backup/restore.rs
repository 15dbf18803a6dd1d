//! Restoring packages from backup archives.
//!
//! The backup filename is the only record of what an archive contains, so
//! restore starts by parsing it. Several generations of naming are
//! accepted, newest first:
//!
//! 1. `{kind}-{slug}-v{version}-{date}-{time}-backup.zip`
//! 2. `{kind}-{slug}-v{version}-backup.zip`
//! 3. `{kind}-{slug}-backup.zip`
//! 4. `{slug}-v{version}-backup.zip` (legacy, kind defaults to plugin)
//! 5. `{slug}-backup.zip` (legacy)
//!
//! Because the filename feeds directly into filesystem paths, restore
//! refuses slugs containing path separators or dots, and refuses to
//! proceed when the delete target resolves to the package root itself.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use regex::Regex;
use tracing::{debug, info, warn};
use zip::ZipArchive;

use crate::cache::FileCache;
use crate::constants::{CACHE_KEY_PLUGIN_INDEX, CACHE_KEY_THEME_INDEX};
use crate::core::{PackageKind, PackupError};

/// What a backup filename says about its contents.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedBackup {
    pub kind: PackageKind,
    pub slug: String,
    pub version: Option<String>,
}

static TIMESTAMPED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(plugin|theme)-(.+?)-v(.+?)-(\d{8})-(\d{6})-backup\.zip$").unwrap()
});
static VERSIONED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(plugin|theme)-(.+?)-v(.+?)-backup\.zip$").unwrap());
static PLAIN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(plugin|theme)-(.+?)-backup\.zip$").unwrap());
static LEGACY_VERSIONED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-v(.+?)-backup\.zip$").unwrap());
static LEGACY_PLAIN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(.+)-backup\.zip$").unwrap());

fn kind_from_str(s: &str) -> PackageKind {
    match s {
        "theme" => PackageKind::Theme,
        _ => PackageKind::Plugin,
    }
}

fn version_field(v: &str) -> Option<String> {
    (v != "na").then(|| v.to_string())
}

/// Parse a backup filename into its recorded kind, slug, and version.
///
/// Returns `None` when the name matches no known backup form.
pub fn parse_backup_filename(file_name: &str) -> Option<ParsedBackup> {
    if let Some(caps) = TIMESTAMPED.captures(file_name) {
        return Some(ParsedBackup {
            kind: kind_from_str(&caps[1]),
            slug: caps[2].to_string(),
            version: version_field(&caps[3]),
        });
    }
    if let Some(caps) = VERSIONED.captures(file_name) {
        return Some(ParsedBackup {
            kind: kind_from_str(&caps[1]),
            slug: caps[2].to_string(),
            version: version_field(&caps[3]),
        });
    }
    if let Some(caps) = PLAIN.captures(file_name) {
        return Some(ParsedBackup {
            kind: kind_from_str(&caps[1]),
            slug: caps[2].to_string(),
            version: None,
        });
    }
    if let Some(caps) = LEGACY_VERSIONED.captures(file_name) {
        return Some(ParsedBackup {
            kind: PackageKind::Plugin,
            slug: caps[1].to_string(),
            version: version_field(&caps[2]),
        });
    }
    if let Some(caps) = LEGACY_PLAIN.captures(file_name) {
        return Some(ParsedBackup {
            kind: PackageKind::Plugin,
            slug: caps[1].to_string(),
            version: None,
        });
    }
    None
}

/// The outcome of a successful restore.
#[derive(Debug, Clone, PartialEq)]
pub struct RestoreOutcome {
    pub kind: PackageKind,
    pub slug: String,
    pub version: Option<String>,
}

/// Replaces an installed package with the contents of a backup archive.
pub struct RestoreManager {
    backups_dir: PathBuf,
    plugins_root: PathBuf,
    themes_root: PathBuf,
    cache: FileCache,
}

impl RestoreManager {
    pub fn new(
        backups_dir: impl Into<PathBuf>,
        plugins_root: impl Into<PathBuf>,
        themes_root: impl Into<PathBuf>,
        cache: FileCache,
    ) -> Self {
        Self {
            backups_dir: backups_dir.into(),
            plugins_root: plugins_root.into(),
            themes_root: themes_root.into(),
            cache,
        }
    }

    fn root_for(&self, kind: PackageKind) -> &Path {
        match kind {
            PackageKind::Plugin => &self.plugins_root,
            PackageKind::Theme => &self.themes_root,
        }
    }

    /// Restore a package from the named backup archive.
    ///
    /// The existing install, if any, is deleted first; when deletion fails
    /// the directory is moved aside to a hidden trash name instead, and the
    /// restore continues. Extraction targets the package root, so the
    /// archive's own top-level directory recreates the package.
    pub async fn perform_restore(&self, file_name: &str) -> Result<RestoreOutcome> {
        let archive_path = self.backups_dir.join(file_name);
        if !archive_path.is_file() {
            return Err(PackupError::BackupNotFound {
                file: file_name.to_string(),
            }
            .into());
        }

        let parsed = parse_backup_filename(file_name).ok_or_else(|| PackupError::BackupNotFound {
            file: file_name.to_string(),
        })?;

        // The slug becomes a path component; anything that could traverse
        // or collapse the path is rejected outright. Dots are banned
        // entirely, which also rules out `..`.
        if parsed.slug.is_empty()
            || parsed.slug.contains('.')
            || parsed.slug.contains('/')
            || parsed.slug.contains('\\')
        {
            return Err(PackupError::InvalidBackupSlug { slug: parsed.slug }.into());
        }

        let root = self.root_for(parsed.kind);
        tokio::fs::create_dir_all(root)
            .await
            .with_context(|| format!("failed to create package root: {}", root.display()))?;

        let dest = root.join(&parsed.slug);
        self.guard_destination(root, &dest)?;

        info!("restoring {} '{}' from {file_name}", parsed.kind, parsed.slug);
        self.remove_existing(&dest, &parsed.slug).await;
        self.extract(&archive_path, root)?;

        let key = match parsed.kind {
            PackageKind::Plugin => CACHE_KEY_PLUGIN_INDEX,
            PackageKind::Theme => CACHE_KEY_THEME_INDEX,
        };
        if let Err(e) = self.cache.delete(key).await {
            warn!("failed to invalidate index cache after restore: {e}");
        }

        Ok(RestoreOutcome {
            kind: parsed.kind,
            slug: parsed.slug,
            version: parsed.version,
        })
    }

    /// Restore the newest archive recorded for `slug`.
    pub async fn restore_latest_for_slug(&self, slug: &str) -> Result<RestoreOutcome> {
        let manager = super::BackupManager::new(&self.backups_dir, true);
        let latest = manager
            .latest_for_slug(slug)?
            .ok_or_else(|| PackupError::BackupNotFound {
                file: format!("<latest backup of {slug}>"),
            })?;
        self.perform_restore(&latest.file_name).await
    }

    /// Refuse a delete target that resolves to the package root itself.
    fn guard_destination(&self, root: &Path, dest: &Path) -> Result<()> {
        if let Ok(canonical_dest) = dest.canonicalize() {
            let canonical_root = root
                .canonicalize()
                .with_context(|| format!("failed to resolve package root: {}", root.display()))?;
            if canonical_dest == canonical_root {
                return Err(PackupError::InvalidRestoreDestination.into());
            }
        }
        Ok(())
    }

    /// Delete the current install, falling back to a trash-rename.
    ///
    /// Restore must not abort just because the old tree is undeletable
    /// (locked file, permissions). Moving it aside clears the path for
    /// extraction; the trash directory is left for manual cleanup.
    async fn remove_existing(&self, dest: &Path, slug: &str) {
        let file_dest = if dest.exists() {
            dest.to_path_buf()
        } else {
            let single_file = dest.with_extension("toml");
            if !single_file.exists() {
                return;
            }
            single_file
        };

        let result = if file_dest.is_dir() {
            tokio::fs::remove_dir_all(&file_dest).await
        } else {
            tokio::fs::remove_file(&file_dest).await
        };

        if let Err(e) = result {
            let epoch = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_secs())
                .unwrap_or(0);
            let trash = file_dest.with_file_name(format!(".{slug}_trash_{epoch}"));
            warn!(
                "could not delete {} ({e}), moving aside to {}",
                file_dest.display(),
                trash.display()
            );
            if let Err(e) = tokio::fs::rename(&file_dest, &trash).await {
                warn!("move-aside also failed: {e}, extracting over the top");
                return;
            }
            // The rename cleared the destination; a second delete attempt
            // on the trashed tree often succeeds once nothing holds the
            // old path anymore. Leftovers stay for manual cleanup.
            if let Err(e) = discard_trashed(&trash).await {
                warn!("trashed tree left at {}: {e}", trash.display());
            }
        }
    }

    fn extract(&self, archive_path: &Path, root: &Path) -> Result<()> {
        debug!("extracting {} into {}", archive_path.display(), root.display());
        let file = std::fs::File::open(archive_path)
            .with_context(|| format!("failed to open archive: {}", archive_path.display()))?;
        let mut archive = ZipArchive::new(file)
            .with_context(|| format!("invalid archive: {}", archive_path.display()))?;
        archive
            .extract(root)
            .with_context(|| format!("failed to extract {}", archive_path.display()))?;
        Ok(())
    }
}

/// Remove a trashed install tree, directory or single file.
async fn discard_trashed(trash: &Path) -> std::io::Result<()> {
    if trash.is_dir() {
        tokio::fs::remove_dir_all(trash).await
    } else {
        tokio::fs::remove_file(trash).await
    }
}
