//! Self-update against GitHub releases.
//!
//! The latest release is read from the GitHub API
//! (`/repos/{owner}/{repo}/releases/latest`); its tag, minus a leading
//! `v`, is the candidate version. The release is expected to carry an
//! asset named `packup-<version>.zip` containing the new executable. The
//! running binary is moved aside before the copy and restored if anything
//! fails (see [`super::exe_backup`]).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::constants::{GITHUB_OWNER, GITHUB_REPO, GITHUB_TIMEOUT, USER_AGENT};
use crate::core::PackupError;
use crate::version;

use super::exe_backup::ExeBackup;

#[derive(Debug, Deserialize)]
struct ReleaseResponse {
    tag_name: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    html_url: Option<String>,
}

/// A published release of the binary.
#[derive(Debug, Clone, PartialEq)]
pub struct Release {
    pub version: String,
    pub notes: Option<String>,
    pub url: Option<String>,
}

pub struct SelfUpdater {
    repo_owner: String,
    repo_name: String,
    current_version: String,
    force: bool,
    client: reqwest::Client,
}

impl SelfUpdater {
    pub fn new(current_version: &str, force: bool) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(GITHUB_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            repo_owner: GITHUB_OWNER.to_string(),
            repo_name: GITHUB_REPO.to_string(),
            current_version: current_version.to_string(),
            force,
            client,
        })
    }

    /// Fetch the latest published release.
    pub async fn latest_release(&self) -> Result<Release> {
        let url = format!(
            "https://api.github.com/repos/{}/{}/releases/latest",
            self.repo_owner, self.repo_name
        );
        debug!("checking latest release at {url}");

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/vnd.github.v3+json")
            .send()
            .await
            .map_err(|e| PackupError::SelfUpdateFailed {
                reason: format!("release check failed: {e}"),
            })?;
        if !response.status().is_success() {
            return Err(PackupError::SelfUpdateFailed {
                reason: format!("release check returned {}", response.status()),
            }
            .into());
        }

        let release: ReleaseResponse =
            response.json().await.map_err(|e| PackupError::SelfUpdateFailed {
                reason: format!("invalid release response: {e}"),
            })?;

        let version = release.tag_name.trim().trim_start_matches('v').to_string();
        if version.is_empty() {
            return Err(PackupError::SelfUpdateFailed {
                reason: "release has an empty tag".to_string(),
            }
            .into());
        }
        Ok(Release {
            version,
            notes: release.body,
            url: release.html_url,
        })
    }

    /// Latest release if it is newer than the running version.
    ///
    /// With `force` set, an equal-or-older release is still returned so a
    /// damaged install can be reapplied.
    pub async fn check_for_update(&self) -> Result<Option<Release>> {
        let release = self.latest_release().await?;
        if self.force || version::is_newer(&release.version, &self.current_version) {
            Ok(Some(release))
        } else {
            Ok(None)
        }
    }

    /// Download `release` and replace the executable at `target`.
    pub async fn apply(&self, release: &Release, target: &Path, backup_first: bool) -> Result<()> {
        let asset_url = format!(
            "https://github.com/{}/{}/releases/download/v{}/{}-{}.zip",
            self.repo_owner,
            self.repo_name,
            release.version,
            crate::constants::GITHUB_REPO,
            release.version
        );

        let work_dir = tempfile::tempdir().context("failed to create temp directory")?;
        let new_exe = self.download_release_binary(&asset_url, work_dir.path()).await?;

        let backup = if backup_first {
            Some(ExeBackup::move_aside(target).await?)
        } else {
            if target.exists() {
                tokio::fs::remove_file(target).await.with_context(|| {
                    format!("failed to remove current executable: {}", target.display())
                })?;
            }
            None
        };

        match install_binary(&new_exe, target).await {
            Ok(()) => {
                if let Some(backup) = backup {
                    backup.discard().await;
                }
                info!("updated to version {}", release.version);
                Ok(())
            }
            Err(e) => {
                warn!("installing new executable failed: {e:#}");
                if let Some(backup) = backup {
                    backup
                        .restore()
                        .await
                        .context("rollback after failed self-update also failed")?;
                }
                Err(e)
            }
        }
    }

    async fn download_release_binary(&self, url: &str, dir: &Path) -> Result<PathBuf> {
        debug!("downloading release asset {url}");
        let response =
            self.client.get(url).send().await.map_err(|e| PackupError::SelfUpdateFailed {
                reason: format!("asset download failed: {e}"),
            })?;
        if !response.status().is_success() {
            return Err(PackupError::SelfUpdateFailed {
                reason: format!("asset download returned {} for {url}", response.status()),
            }
            .into());
        }
        let bytes = response.bytes().await.map_err(|e| PackupError::SelfUpdateFailed {
            reason: format!("asset download failed: {e}"),
        })?;

        let archive_path = dir.join("release.zip");
        tokio::fs::write(&archive_path, &bytes).await.context("failed to write release asset")?;

        let extract_dir = dir.join("extracted");
        extract_archive(&archive_path, &extract_dir)?;
        find_binary(&extract_dir)?.ok_or_else(|| {
            PackupError::SelfUpdateFailed {
                reason: "release asset contains no executable".to_string(),
            }
            .into()
        })
    }
}

fn extract_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;
    let file = std::fs::File::open(archive_path)?;
    let mut archive = zip::ZipArchive::new(file).context("invalid release archive")?;
    archive.extract(dest).context("failed to extract release archive")?;
    Ok(())
}

/// Locate the packup binary inside an extracted release tree.
fn find_binary(dir: &Path) -> Result<Option<PathBuf>> {
    for entry in walkdir::WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name().to_string_lossy();
        if name == "packup" || name == "packup.exe" {
            return Ok(Some(entry.path().to_path_buf()));
        }
    }
    Ok(None)
}

async fn install_binary(new_exe: &Path, target: &Path) -> Result<()> {
    tokio::fs::copy(new_exe, target)
        .await
        .with_context(|| format!("failed to copy new executable to {}", target.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o755);
        tokio::fs::set_permissions(target, perms)
            .await
            .with_context(|| format!("failed to set permissions on {}", target.display()))?;
    }
    Ok(())
}
