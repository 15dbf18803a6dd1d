//! Backup archive creation and listing.
//!
//! Backups are plain zip files whose filename is the entire record:
//!
//! ```text
//! {kind}-{slug}-v{version}-{YYYYMMDD}-{HHMMSS}-backup.zip
//! ```
//!
//! with `na` standing in when the installed version is unknown. No
//! database or manifest sits beside them; restore reconstructs everything
//! it needs by parsing the filename (see [`restore`]).
//!
//! Archive entries are stored under a single top-level directory named
//! after the backed-up package, so extraction against the package root
//! recreates the package in place.

pub mod restore;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::constants::BACKUP_SUFFIX;
use crate::core::{PackageKind, PackupError};

/// A backup archive on disk, as listed by `backup list`.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupEntry {
    pub file_name: String,
    pub path: PathBuf,
    pub size: u64,
    pub parsed: Option<restore::ParsedBackup>,
}

/// Creates, lists, and prunes backup archives.
pub struct BackupManager {
    backups_dir: PathBuf,
    keep_history: bool,
}

impl BackupManager {
    pub fn new(backups_dir: impl Into<PathBuf>, keep_history: bool) -> Self {
        Self {
            backups_dir: backups_dir.into(),
            keep_history,
        }
    }

    pub fn backups_dir(&self) -> &Path {
        &self.backups_dir
    }

    /// Create the backup directory and drop index-blocking stubs into it.
    ///
    /// Backup directories may end up under a web-served tree, so an
    /// `index.php` stub and a deny-all `.htaccess` keep their contents
    /// from being listed or fetched over HTTP.
    pub fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.backups_dir).with_context(|| {
            format!("failed to create backup directory: {}", self.backups_dir.display())
        })?;

        let index_stub = self.backups_dir.join("index.php");
        if !index_stub.exists() {
            std::fs::write(&index_stub, "<?php // Silence is golden.\n")?;
        }
        let htaccess = self.backups_dir.join(".htaccess");
        if !htaccess.exists() {
            std::fs::write(&htaccess, "deny from all\n")?;
        }
        Ok(())
    }

    /// Zip up `source` as a backup of `slug` and return the archive path.
    ///
    /// `version` of `None` records `na` in the filename. When history is
    /// disabled, older backups of the same package are pruned after the
    /// new archive lands.
    pub fn create_backup(
        &self,
        kind: PackageKind,
        slug: &str,
        version: Option<&str>,
        source: &Path,
    ) -> Result<PathBuf> {
        self.ensure_dir()?;

        let stamp = Utc::now().format("%Y%m%d-%H%M%S");
        let version_part = version.filter(|v| !v.is_empty()).unwrap_or("na");
        let file_name = format!("{kind}-{slug}-v{version_part}-{stamp}{BACKUP_SUFFIX}");
        let archive_path = self.backups_dir.join(&file_name);

        debug!("backing up {} to {}", source.display(), archive_path.display());
        write_archive(source, &archive_path).map_err(|e| PackupError::BackupFailed {
            slug: slug.to_string(),
            reason: e.to_string(),
        })?;

        if !self.keep_history {
            self.prune_older(kind, slug, &file_name)?;
        }

        info!("created backup {file_name}");
        Ok(archive_path)
    }

    /// All backup archives in the directory, newest filename first.
    pub fn list_backups(&self) -> Result<Vec<BackupEntry>> {
        let mut backups = Vec::new();
        let entries = match std::fs::read_dir(&self.backups_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read backup directory: {}", self.backups_dir.display())
                });
            }
        };

        for entry in entries {
            let entry = entry?;
            let Some(file_name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !file_name.ends_with(BACKUP_SUFFIX) {
                continue;
            }
            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            backups.push(BackupEntry {
                parsed: restore::parse_backup_filename(&file_name),
                path: entry.path(),
                size,
                file_name,
            });
        }

        // Timestamps sort lexically within a package, and a reverse name
        // sort puts the newest archives first overall.
        backups.sort_by(|a, b| b.file_name.cmp(&a.file_name));
        Ok(backups)
    }

    /// Newest backup archive recorded for `slug`, if any.
    pub fn latest_for_slug(&self, slug: &str) -> Result<Option<BackupEntry>> {
        Ok(self
            .list_backups()?
            .into_iter()
            .find(|b| b.parsed.as_ref().is_some_and(|p| p.slug == slug)))
    }

    /// Remove every backup of `(kind, slug)` except `keep`.
    fn prune_older(&self, kind: PackageKind, slug: &str, keep: &str) -> Result<()> {
        for backup in self.list_backups()? {
            if backup.file_name == keep {
                continue;
            }
            let matches = backup
                .parsed
                .as_ref()
                .is_some_and(|p| p.kind == kind && p.slug == slug);
            if matches {
                debug!("pruning old backup {}", backup.file_name);
                if let Err(e) = std::fs::remove_file(&backup.path) {
                    warn!("failed to prune {}: {e}", backup.path.display());
                }
            }
        }
        Ok(())
    }
}

/// Write `source` into a zip at `archive_path`.
///
/// `source` may be a directory or a single file. Entries are stored under
/// `<basename>/...` so the archive extracts back into a package root.
fn write_archive(source: &Path, archive_path: &Path) -> Result<()> {
    let file = std::fs::File::create(archive_path)
        .with_context(|| format!("failed to create archive: {}", archive_path.display()))?;
    let mut writer = ZipWriter::new(file);
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    if source.is_file() {
        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| anyhow::anyhow!("unrepresentable file name: {}", source.display()))?;
        writer.start_file(name, options)?;
        let mut input = std::fs::File::open(source)?;
        std::io::copy(&mut input, &mut writer)?;
        writer.finish()?;
        return Ok(());
    }

    let base = source
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("unrepresentable directory name: {}", source.display()))?;

    for entry in WalkDir::new(source).follow_links(false) {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(source)
            .context("walked entry outside source")?;
        if rel.as_os_str().is_empty() {
            continue;
        }
        let rel_name = rel.to_string_lossy().replace('\\', "/");
        let entry_name = format!("{base}/{rel_name}");

        if entry.file_type().is_dir() {
            writer.add_directory(format!("{entry_name}/"), options)?;
        } else if entry.file_type().is_file() {
            writer.start_file(&entry_name, options)?;
            let mut input = std::fs::File::open(entry.path())?;
            std::io::copy(&mut input, &mut writer)?;
        }
        // Symlinks are skipped; backups hold regular content only.
    }

    writer.finish()?;
    Ok(())
}

/// Read one file out of a zip archive, used by tests and restore checks.
#[cfg(test)]
fn read_archive_entry(archive_path: &Path, entry_name: &str) -> Result<String> {
    use std::io::Read;

    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file)?;
    let mut entry = archive.by_name(entry_name)?;
    let mut content = String::new();
    entry.read_to_string(&mut content)?;
    Ok(content)
}
