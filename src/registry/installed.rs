//! Discovery of installed packages on disk.
//!
//! An installed package is either a directory containing a `package.toml`
//! manifest, or a standalone `<slug>.toml` file directly under the root
//! (the single-file convention for trivial packages). The manifest carries
//! the display name and installed version.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::warn;

/// Manifest fields read from `package.toml`.
#[derive(Debug, Deserialize)]
struct PackageManifest {
    name: String,
    version: String,
}

/// One package found under a package root.
#[derive(Debug, Clone, PartialEq)]
pub struct InstalledPackage {
    /// Directory name (or file stem for single-file packages).
    pub slug: String,
    /// Display name from the manifest.
    pub name: String,
    pub version: String,
    /// Manifest path, relative to the package root.
    pub file_path: PathBuf,
}

impl InstalledPackage {
    /// Directory that holds this package under `root`, or the file itself
    /// for single-file packages.
    pub fn install_path(&self, root: &Path) -> PathBuf {
        match self.file_path.parent() {
            Some(parent) if parent != Path::new("") => root.join(parent),
            _ => root.join(&self.file_path),
        }
    }

    /// True for packages installed as a bare `<slug>.toml` at the root.
    pub fn is_single_file(&self) -> bool {
        self.file_path.parent().is_none_or(|p| p == Path::new(""))
    }
}

/// Scan a package root for installed packages.
///
/// A missing root is treated as "nothing installed". Unreadable manifests
/// are skipped with a warning so one broken package does not hide the rest.
pub async fn scan(root: &Path) -> Result<Vec<InstalledPackage>> {
    let mut packages = Vec::new();
    let mut entries = match tokio::fs::read_dir(root).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(packages),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read package root: {}", root.display()));
        }
    };

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let file_type = entry.file_type().await?;

        if file_type.is_dir() {
            let manifest_path = path.join("package.toml");
            if !manifest_path.exists() {
                continue;
            }
            let Some(slug) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            match read_manifest(&manifest_path).await {
                Ok(manifest) => packages.push(InstalledPackage {
                    slug: slug.to_string(),
                    name: manifest.name,
                    version: manifest.version,
                    file_path: PathBuf::from(slug).join("package.toml"),
                }),
                Err(e) => warn!("skipping {}: {e:#}", manifest_path.display()),
            }
        } else if file_type.is_file() && path.extension().is_some_and(|ext| ext == "toml") {
            let Some(stem) = path.file_stem().and_then(|n| n.to_str()) else {
                continue;
            };
            match read_manifest(&path).await {
                Ok(manifest) => packages.push(InstalledPackage {
                    slug: stem.to_string(),
                    name: manifest.name,
                    version: manifest.version,
                    file_path: PathBuf::from(format!("{stem}.toml")),
                }),
                Err(e) => warn!("skipping {}: {e:#}", path.display()),
            }
        }
    }

    packages.sort_by(|a, b| a.slug.cmp(&b.slug));
    Ok(packages)
}

async fn read_manifest(path: &Path) -> Result<PackageManifest> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    toml::from_str(&content).with_context(|| format!("invalid manifest: {}", path.display()))
}

/// Locate an installed package matching a repository descriptor.
///
/// Matching is tiered: an exact directory name match on `slug` wins, then
/// an exact display-name match on `name`, then any package whose manifest
/// path starts with `<slug>/` or is exactly `<slug>.toml`.
pub fn find_installed<'a>(
    installed: &'a [InstalledPackage],
    slug: &str,
    name: &str,
) -> Option<&'a InstalledPackage> {
    installed
        .iter()
        .find(|p| p.slug == slug)
        .or_else(|| installed.iter().find(|p| p.name == name))
        .or_else(|| {
            let dir_prefix = format!("{slug}/");
            let single_file = format!("{slug}.toml");
            installed.iter().find(|p| {
                let path = p.file_path.to_string_lossy();
                path.starts_with(&dir_prefix) || path == single_file
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write_package(root: &Path, slug: &str, name: &str, version: &str) {
        let dir = root.join(slug);
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(
            dir.join("package.toml"),
            format!("name = \"{name}\"\nversion = \"{version}\"\n"),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn scan_finds_directory_packages() {
        let root = TempDir::new().unwrap();
        write_package(root.path(), "alpha", "Alpha Tools", "1.5").await;
        write_package(root.path(), "beta", "Beta Widget", "2.0").await;

        let packages = scan(root.path()).await.unwrap();
        assert_eq!(packages.len(), 2);
        assert_eq!(packages[0].slug, "alpha");
        assert_eq!(packages[0].version, "1.5");
        assert_eq!(packages[1].name, "Beta Widget");
    }

    #[tokio::test]
    async fn scan_finds_single_file_packages() {
        let root = TempDir::new().unwrap();
        tokio::fs::write(
            root.path().join("tiny.toml"),
            "name = \"Tiny\"\nversion = \"0.3\"\n",
        )
        .await
        .unwrap();

        let packages = scan(root.path()).await.unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].slug, "tiny");
        assert!(packages[0].is_single_file());
        assert_eq!(packages[0].install_path(root.path()), root.path().join("tiny.toml"));
    }

    #[tokio::test]
    async fn scan_skips_directories_without_manifest() {
        let root = TempDir::new().unwrap();
        tokio::fs::create_dir_all(root.path().join("not-a-package")).await.unwrap();
        write_package(root.path(), "real", "Real", "1.0").await;

        let packages = scan(root.path()).await.unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].slug, "real");
    }

    #[tokio::test]
    async fn scan_of_missing_root_is_empty() {
        let root = TempDir::new().unwrap();
        let packages = scan(&root.path().join("absent")).await.unwrap();
        assert!(packages.is_empty());
    }

    #[tokio::test]
    async fn scan_skips_broken_manifests() {
        let root = TempDir::new().unwrap();
        let dir = root.path().join("broken");
        tokio::fs::create_dir_all(&dir).await.unwrap();
        tokio::fs::write(dir.join("package.toml"), "name = [oops").await.unwrap();
        write_package(root.path(), "fine", "Fine", "1.0").await;

        let packages = scan(root.path()).await.unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(packages[0].slug, "fine");
    }

    fn pkg(slug: &str, name: &str, file_path: &str) -> InstalledPackage {
        InstalledPackage {
            slug: slug.to_string(),
            name: name.to_string(),
            version: "1.0".to_string(),
            file_path: PathBuf::from(file_path),
        }
    }

    #[test]
    fn find_prefers_slug_match() {
        let installed = vec![
            pkg("alpha", "Something Else", "alpha/package.toml"),
            pkg("other", "Alpha", "other/package.toml"),
        ];
        let found = find_installed(&installed, "alpha", "Alpha").unwrap();
        assert_eq!(found.slug, "alpha");
    }

    #[test]
    fn find_falls_back_to_display_name() {
        let installed = vec![pkg("renamed-dir", "Alpha Tools", "renamed-dir/package.toml")];
        let found = find_installed(&installed, "alpha", "Alpha Tools").unwrap();
        assert_eq!(found.slug, "renamed-dir");
    }

    #[test]
    fn find_falls_back_to_path_prefix() {
        let installed = vec![pkg("tiny", "Mismatched Name", "tiny.toml")];
        // Neither slug ("tiny" matches, so force the third tier via a
        // differently keyed list) nor name match directly.
        let other = vec![InstalledPackage {
            slug: "Tiny Display".to_string(),
            name: "Unrelated".to_string(),
            version: "1.0".to_string(),
            file_path: PathBuf::from("tiny.toml"),
        }];
        assert!(find_installed(&installed, "tiny", "nope").is_some());
        assert!(find_installed(&other, "tiny", "nope").is_some());
        assert!(find_installed(&other, "missing", "nope").is_none());
    }
}
