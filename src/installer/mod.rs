//! Package download and installation engine.
//!
//! Installing and updating share one pipeline: resolve the descriptor from
//! the repository index, download the zip, verify its checksum when the
//! index provides one, back up any existing install, extract into a scratch
//! directory, and swap the extracted tree into the package root. The swap
//! targets the directory the package is *already* installed under, even
//! when that differs from the repository slug, so renamed installs update
//! in place.
//!
//! The swap itself is delete-then-copy rather than atomic. A failure
//! between the two leaves the package absent, which is why a backup is
//! taken first.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::backup::BackupManager;
use crate::cache::FileCache;
use crate::config::GlobalConfig;
use crate::core::{PackageKind, PackupError};
use crate::registry::installed::{self, InstalledPackage};
use crate::registry::{PackageDescriptor, RegistryClient};

/// What an install or update actually did.
#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub slug: String,
    /// Version that was installed before, `None` for a fresh install.
    pub old_version: Option<String>,
    pub new_version: String,
}

pub struct Installer {
    config: GlobalConfig,
    cache: FileCache,
    client: reqwest::Client,
}

impl Installer {
    pub fn new(config: GlobalConfig, cache: FileCache) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(crate::constants::INDEX_FETCH_TIMEOUT)
            .user_agent(crate::constants::USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { config, cache, client })
    }

    pub fn registry_for(&self, kind: PackageKind) -> Result<RegistryClient> {
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

    /// Install or update one package from the repository.
    pub async fn perform_update(&self, kind: PackageKind, slug: &str) -> Result<UpdateOutcome> {
        let registry = self.registry_for(kind)?;
        let descriptor = registry
            .find_package(slug)
            .await
            .ok_or_else(|| PackupError::UpdateNotFound { slug: slug.to_string() })?;

        let root = self.package_root(kind);
        let packages = installed::scan(root).await?;
        let existing = installed::find_installed(&packages, &descriptor.slug, &descriptor.name).cloned();

        let download_dir = tempfile::tempdir().context("failed to create download directory")?;
        let archive_path = self.download(&descriptor, download_dir.path()).await?;
        verify_checksum(&archive_path, descriptor.checksum.as_deref())?;

        if let Some(ref pkg) = existing {
            if self.config.backups.auto_backup {
                let backups = BackupManager::new(
                    &self.config.paths.backups_dir,
                    self.config.backups.keep_history,
                );
                backups.create_backup(kind, &pkg.slug, Some(&pkg.version), &pkg.install_path(root))?;
            }
        }

        let outcome = self
            .install_archive(kind, &descriptor, &archive_path, existing.as_ref())
            .await?;

        if let Err(e) = registry.invalidate().await {
            warn!("failed to invalidate index cache after update: {e}");
        }
        Ok(outcome)
    }

    async fn download(&self, descriptor: &PackageDescriptor, dir: &Path) -> Result<PathBuf> {
        let url = &descriptor.download_url;
        if url.trim().is_empty() {
            return Err(PackupError::DownloadFailed {
                url: url.clone(),
                reason: "descriptor has no package URL".to_string(),
            }
            .into());
        }

        debug!("downloading {url}");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| PackupError::DownloadFailed {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        if !response.status().is_success() {
            return Err(PackupError::DownloadFailed {
                url: url.clone(),
                reason: format!("server returned {}", response.status()),
            }
            .into());
        }

        let bytes = response.bytes().await.map_err(|e| PackupError::DownloadFailed {
            url: url.clone(),
            reason: e.to_string(),
        })?;

        let path = dir.join(format!("{}.zip", descriptor.slug));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("failed to write download to {}", path.display()))?;
        Ok(path)
    }

    /// Extract an archive and swap it into the package root.
    ///
    /// The archive must contain a single top-level directory. The
    /// destination directory name follows the existing install when there
    /// is one, and the repository slug otherwise.
    async fn install_archive(
        &self,
        kind: PackageKind,
        descriptor: &PackageDescriptor,
        archive_path: &Path,
        existing: Option<&InstalledPackage>,
    ) -> Result<UpdateOutcome> {
        let root = self.package_root(kind);
        tokio::fs::create_dir_all(root)
            .await
            .with_context(|| format!("failed to create package root: {}", root.display()))?;

        let scratch = self
            .config
            .paths
            .scratch_dir
            .join(format!("packup-{}", descriptor.slug));
        // A stale scratch tree from an interrupted run would confuse the
        // single-subdirectory check below.
        if scratch.exists() {
            tokio::fs::remove_dir_all(&scratch).await.ok();
        }
        tokio::fs::create_dir_all(&scratch)
            .await
            .with_context(|| format!("failed to create scratch directory: {}", scratch.display()))?;

        let result = self.swap_into_place(root, &scratch, descriptor, existing, archive_path);

        // Scratch cleanup happens on both the success and failure paths.
        if let Err(e) = tokio::fs::remove_dir_all(&scratch).await {
            warn!("failed to clean scratch directory {}: {e}", scratch.display());
        }

        let dest_name = result?;
        info!(
            "installed {} '{}' {} into {}",
            kind, descriptor.slug, descriptor.version, dest_name
        );
        Ok(UpdateOutcome {
            slug: descriptor.slug.clone(),
            old_version: existing.map(|p| p.version.clone()),
            new_version: descriptor.version.clone(),
        })
    }

    fn swap_into_place(
        &self,
        root: &Path,
        scratch: &Path,
        descriptor: &PackageDescriptor,
        existing: Option<&InstalledPackage>,
        archive_path: &Path,
    ) -> Result<String> {
        let file = std::fs::File::open(archive_path)
            .with_context(|| format!("failed to open archive: {}", archive_path.display()))?;
        let mut archive = zip::ZipArchive::new(file)
            .with_context(|| format!("invalid archive: {}", archive_path.display()))?;
        archive
            .extract(scratch)
            .with_context(|| format!("failed to extract {}", archive_path.display()))?;

        let extracted = first_subdirectory(scratch)?.ok_or(PackupError::EmptyArchive)?;

        // Keep whatever directory name the package currently lives under.
        let dest_name = existing
            .filter(|p| !p.is_single_file())
            .map(|p| p.slug.clone())
            .unwrap_or_else(|| descriptor.slug.clone());
        let dest = root.join(&dest_name);

        if dest.exists() {
            std::fs::remove_dir_all(&dest)
                .with_context(|| format!("failed to remove old install: {}", dest.display()))?;
        }
        copy_dir(&extracted, &dest)
            .with_context(|| format!("failed to copy package into {}", dest.display()))?;
        Ok(dest_name)
    }
}

/// First directory entry directly under `dir`.
fn first_subdirectory(dir: &Path) -> Result<Option<PathBuf>> {
    let mut dirs: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    Ok(dirs.into_iter().next())
}

/// Recursively copy a directory, skipping symlinks.
fn copy_dir(src: &Path, dst: &Path) -> Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dst.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

/// Compare an archive against an expected hex SHA-256, when one is given.
fn verify_checksum(archive_path: &Path, expected: Option<&str>) -> Result<()> {
    let Some(expected) = expected.filter(|s| !s.trim().is_empty()) else {
        return Ok(());
    };

    let bytes = std::fs::read(archive_path)
        .with_context(|| format!("failed to read archive: {}", archive_path.display()))?;
    let digest = Sha256::digest(&bytes);
    let actual: String = digest.iter().map(|b| format!("{b:02x}")).collect();

    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(PackupError::ChecksumMismatch {
            file: archive_path.display().to_string(),
        }
        .into());
    }
    debug!("checksum verified for {}", archive_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;
    use zip::write::SimpleFileOptions;

    fn test_config(tmp: &TempDir) -> GlobalConfig {
        let mut config = GlobalConfig::default();
        config.repo.url = String::new();
        config.paths.plugins_dir = tmp.path().join("plugins");
        config.paths.themes_dir = tmp.path().join("themes");
        config.paths.backups_dir = tmp.path().join("backups");
        config.paths.scratch_dir = tmp.path().join("scratch");
        config
    }

    fn installer(tmp: &TempDir) -> Installer {
        Installer::new(test_config(tmp), FileCache::new(tmp.path().join("cache"))).unwrap()
    }

    fn descriptor(slug: &str, version: &str) -> PackageDescriptor {
        PackageDescriptor {
            slug: slug.to_string(),
            name: slug.to_string(),
            version: version.to_string(),
            download_url: String::new(),
            description: None,
            changelog: None,
            info_url: None,
            checksum: None,
        }
    }

    /// Build a package zip with one top-level directory.
    fn make_archive(tmp: &TempDir, top_dir: &str, version: &str) -> PathBuf {
        let path = tmp.path().join(format!("{top_dir}-{version}.zip"));
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        let options = SimpleFileOptions::default();
        writer.add_directory(format!("{top_dir}/"), options).unwrap();
        writer.start_file(format!("{top_dir}/package.toml"), options).unwrap();
        writer
            .write_all(format!("name = \"{top_dir}\"\nversion = \"{version}\"\n").as_bytes())
            .unwrap();
        writer.finish().unwrap();
        path
    }

    #[tokio::test]
    async fn unknown_slug_fails_without_touching_disk() {
        let tmp = TempDir::new().unwrap();
        let plugins = tmp.path().join("plugins");
        std::fs::create_dir_all(&plugins).unwrap();
        std::fs::write(plugins.join("sentinel.txt"), b"keep").unwrap();

        // Repository URL is empty, so the index is empty and the slug
        // cannot resolve.
        let err = installer(&tmp)
            .perform_update(PackageKind::Plugin, "ghost")
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PackupError>(),
            Some(PackupError::UpdateNotFound { .. })
        ));
        assert!(plugins.join("sentinel.txt").exists());
        assert!(!tmp.path().join("backups").exists());
    }

    #[tokio::test]
    async fn fresh_install_lands_under_slug() {
        let tmp = TempDir::new().unwrap();
        let ins = installer(&tmp);
        let archive = make_archive(&tmp, "alpha", "2.0");

        let outcome = ins
            .install_archive(PackageKind::Plugin, &descriptor("alpha", "2.0"), &archive, None)
            .await
            .unwrap();

        assert_eq!(outcome.old_version, None);
        assert_eq!(outcome.new_version, "2.0");
        let manifest = tmp.path().join("plugins/alpha/package.toml");
        assert!(manifest.exists());
        assert!(!tmp.path().join("scratch/packup-alpha").exists());
    }

    #[tokio::test]
    async fn update_replaces_existing_install_in_place() {
        let tmp = TempDir::new().unwrap();
        let ins = installer(&tmp);

        // The package lives under a directory name different from its slug.
        let dir = tmp.path().join("plugins/alpha-renamed");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("package.toml"), "name = \"alpha\"\nversion = \"1.5\"\n").unwrap();
        std::fs::write(dir.join("stale.txt"), b"old").unwrap();

        let existing = InstalledPackage {
            slug: "alpha-renamed".to_string(),
            name: "alpha".to_string(),
            version: "1.5".to_string(),
            file_path: PathBuf::from("alpha-renamed/package.toml"),
        };
        let archive = make_archive(&tmp, "alpha", "2.0");
        let outcome = ins
            .install_archive(
                PackageKind::Plugin,
                &descriptor("alpha", "2.0"),
                &archive,
                Some(&existing),
            )
            .await
            .unwrap();

        assert_eq!(outcome.old_version.as_deref(), Some("1.5"));
        // Updated in place under the existing directory name.
        assert!(dir.join("package.toml").exists());
        assert!(!dir.join("stale.txt").exists());
        assert!(!tmp.path().join("plugins/alpha").exists());
    }

    #[tokio::test]
    async fn archive_without_subdirectory_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let ins = installer(&tmp);

        let path = tmp.path().join("flat.zip");
        let file = std::fs::File::create(&path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        writer.start_file("loose.txt", SimpleFileOptions::default()).unwrap();
        writer.write_all(b"no directory").unwrap();
        writer.finish().unwrap();

        let err = ins
            .install_archive(PackageKind::Plugin, &descriptor("flat", "1.0"), &path, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PackupError>(),
            Some(PackupError::EmptyArchive)
        ));
        // Scratch is cleaned up even on failure.
        assert!(!tmp.path().join("scratch/packup-flat").exists());
    }

    #[test]
    fn checksum_mismatch_is_detected() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("file.zip");
        std::fs::write(&path, b"payload").unwrap();

        assert!(verify_checksum(&path, None).is_ok());

        let digest = Sha256::digest(b"payload");
        let good: String = digest.iter().map(|b| format!("{b:02x}")).collect();
        assert!(verify_checksum(&path, Some(&good)).is_ok());
        assert!(verify_checksum(&path, Some(&good.to_uppercase())).is_ok());

        let err = verify_checksum(&path, Some("deadbeef")).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PackupError>(),
            Some(PackupError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn copy_dir_recurses() {
        let tmp = TempDir::new().unwrap();
        let src = tmp.path().join("src");
        std::fs::create_dir_all(src.join("nested")).unwrap();
        std::fs::write(src.join("a.txt"), b"a").unwrap();
        std::fs::write(src.join("nested/b.txt"), b"b").unwrap();

        let dst = tmp.path().join("dst");
        copy_dir(&src, &dst).unwrap();
        assert_eq!(std::fs::read(dst.join("a.txt")).unwrap(), b"a");
        assert_eq!(std::fs::read(dst.join("nested/b.txt")).unwrap(), b"b");
    }
}
