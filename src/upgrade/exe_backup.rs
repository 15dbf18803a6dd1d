//! Move-aside backup of the running executable.
//!
//! Replacing a binary in place can fail halfway. The old executable is
//! first renamed next to itself with a `.bak` suffix; if installing the new
//! one fails, the rename is reversed. A rename stays on the same
//! filesystem, so both directions are atomic.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{debug, warn};

/// Handle to a moved-aside executable.
#[derive(Debug)]
pub struct ExeBackup {
    original: PathBuf,
    backup: PathBuf,
}

impl ExeBackup {
    /// Rename `exe` to `<exe>.bak`, replacing any stale backup.
    pub async fn move_aside(exe: &Path) -> Result<Self> {
        let backup = backup_path(exe);
        if backup.exists() {
            tokio::fs::remove_file(&backup)
                .await
                .with_context(|| format!("failed to remove stale backup: {}", backup.display()))?;
        }
        tokio::fs::rename(exe, &backup)
            .await
            .with_context(|| format!("failed to move {} aside", exe.display()))?;
        debug!("moved {} to {}", exe.display(), backup.display());
        Ok(Self {
            original: exe.to_path_buf(),
            backup,
        })
    }

    /// Put the old executable back, undoing [`Self::move_aside`].
    pub async fn restore(self) -> Result<()> {
        tokio::fs::rename(&self.backup, &self.original)
            .await
            .with_context(|| format!("failed to restore {}", self.original.display()))?;
        debug!("restored {}", self.original.display());
        Ok(())
    }

    /// Keep the new executable and drop the backup.
    ///
    /// On platforms that forbid deleting a running binary's old image the
    /// removal can fail; the leftover `.bak` file is harmless, so this only
    /// warns.
    pub async fn discard(self) {
        if let Err(e) = tokio::fs::remove_file(&self.backup).await {
            warn!("could not remove old executable {}: {e}", self.backup.display());
        }
    }

    pub fn backup_file(&self) -> &Path {
        &self.backup
    }
}

/// Reinstate `<exe>.bak` over the current executable.
///
/// Returns `false` when no backup file exists to roll back to.
pub async fn rollback(exe: &Path) -> Result<bool> {
    let backup = backup_path(exe);
    if !backup.exists() {
        return Ok(false);
    }
    tokio::fs::rename(&backup, exe)
        .await
        .with_context(|| format!("failed to roll back to {}", backup.display()))?;
    debug!("rolled back {} from {}", exe.display(), backup.display());
    Ok(true)
}

fn backup_path(exe: &Path) -> PathBuf {
    let mut name = exe.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".bak");
    exe.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn move_aside_then_restore_round_trips() {
        let tmp = TempDir::new().unwrap();
        let exe = tmp.path().join("packup");
        tokio::fs::write(&exe, b"old binary").await.unwrap();

        let backup = ExeBackup::move_aside(&exe).await.unwrap();
        assert!(!exe.exists());
        assert!(backup.backup_file().exists());

        backup.restore().await.unwrap();
        assert_eq!(tokio::fs::read(&exe).await.unwrap(), b"old binary");
        assert!(!tmp.path().join("packup.bak").exists());
    }

    #[tokio::test]
    async fn discard_removes_the_backup() {
        let tmp = TempDir::new().unwrap();
        let exe = tmp.path().join("packup");
        tokio::fs::write(&exe, b"old").await.unwrap();

        let backup = ExeBackup::move_aside(&exe).await.unwrap();
        tokio::fs::write(&exe, b"new").await.unwrap();
        backup.discard().await;

        assert_eq!(tokio::fs::read(&exe).await.unwrap(), b"new");
        assert!(!tmp.path().join("packup.bak").exists());
    }

    #[tokio::test]
    async fn rollback_reinstates_the_previous_binary() {
        let tmp = TempDir::new().unwrap();
        let exe = tmp.path().join("packup");
        tokio::fs::write(&exe, b"broken update").await.unwrap();
        tokio::fs::write(tmp.path().join("packup.bak"), b"known good").await.unwrap();

        assert!(rollback(&exe).await.unwrap());
        assert_eq!(tokio::fs::read(&exe).await.unwrap(), b"known good");
        assert!(!tmp.path().join("packup.bak").exists());

        // Nothing left to roll back to.
        assert!(!rollback(&exe).await.unwrap());
    }

    #[tokio::test]
    async fn stale_backup_is_replaced() {
        let tmp = TempDir::new().unwrap();
        let exe = tmp.path().join("packup");
        tokio::fs::write(&exe, b"current").await.unwrap();
        tokio::fs::write(tmp.path().join("packup.bak"), b"ancient").await.unwrap();

        let backup = ExeBackup::move_aside(&exe).await.unwrap();
        assert_eq!(tokio::fs::read(backup.backup_file()).await.unwrap(), b"current");
    }
}
