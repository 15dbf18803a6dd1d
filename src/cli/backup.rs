//! `packup backup`

use anyhow::Result;
use clap::{Args, Subcommand};
use colored::Colorize;

use crate::backup::restore::RestoreManager;
use crate::backup::BackupManager;
use crate::core::{PackageKind, PackupError};
use crate::registry::installed;

use super::common::CommandContext;

#[derive(Args, Debug)]
pub struct BackupArgs {
    #[command(subcommand)]
    pub command: BackupCommands,
}

#[derive(Subcommand, Debug)]
pub enum BackupCommands {
    /// Back up an installed package now
    Create {
        /// Slug of the installed package
        slug: String,

        /// Back up a theme instead of a plugin
        #[arg(long)]
        theme: bool,
    },

    /// List existing backup archives
    List,

    /// Restore a package from a backup archive
    Restore {
        /// Backup filename, as shown by 'backup list'
        #[arg(required_unless_present = "slug", conflicts_with = "slug")]
        file: Option<String>,

        /// Restore the newest backup of this package instead
        #[arg(long)]
        slug: Option<String>,
    },
}

impl BackupArgs {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match &self.command {
            BackupCommands::Create { slug, theme } => self.create(ctx, slug, *theme).await,
            BackupCommands::List => self.list(ctx),
            BackupCommands::Restore { file, slug } => self.restore(ctx, file.as_deref(), slug.as_deref()).await,
        }
    }

    async fn create(&self, ctx: &CommandContext, slug: &str, theme: bool) -> Result<()> {
        let kind = if theme { PackageKind::Theme } else { PackageKind::Plugin };
        let root = ctx.package_root(kind);
        let packages = installed::scan(root).await?;
        let pkg = packages
            .iter()
            .find(|p| p.slug == slug)
            .ok_or_else(|| PackupError::BackupFailed {
                slug: slug.to_string(),
                reason: format!("no installed {kind} named '{slug}'"),
            })?;

        let manager = BackupManager::new(
            &ctx.config.paths.backups_dir,
            ctx.config.backups.keep_history,
        );
        let path = manager.create_backup(kind, &pkg.slug, Some(&pkg.version), &pkg.install_path(root))?;
        println!("Created {}", path.display());
        Ok(())
    }

    fn list(&self, ctx: &CommandContext) -> Result<()> {
        let manager = BackupManager::new(&ctx.config.paths.backups_dir, true);
        let backups = manager.list_backups()?;
        if backups.is_empty() {
            println!("No backups found in {}", ctx.config.paths.backups_dir.display());
            return Ok(());
        }

        for backup in backups {
            let detail = match &backup.parsed {
                Some(parsed) => format!(
                    "{} {} {}",
                    parsed.kind,
                    parsed.slug,
                    parsed.version.as_deref().unwrap_or("(unknown version)")
                ),
                None => "(unrecognized name)".dimmed().to_string(),
            };
            println!("{:<60} {:>8}  {}", backup.file_name, format_size(backup.size), detail);
        }
        Ok(())
    }

    async fn restore(&self, ctx: &CommandContext, file: Option<&str>, slug: Option<&str>) -> Result<()> {
        let manager = RestoreManager::new(
            &ctx.config.paths.backups_dir,
            &ctx.config.paths.plugins_dir,
            &ctx.config.paths.themes_dir,
            ctx.cache.clone(),
        );

        let outcome = match (file, slug) {
            (Some(file), _) => manager.perform_restore(file).await?,
            (None, Some(slug)) => manager.restore_latest_for_slug(slug).await?,
            (None, None) => unreachable!("clap enforces file or --slug"),
        };

        println!(
            "{} restored {} '{}'{}",
            "ok".green(),
            outcome.kind,
            outcome.slug,
            outcome
                .version
                .map(|v| format!(" (version {v})"))
                .unwrap_or_default()
        );
        Ok(())
    }
}

fn format_size(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.1} MiB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KiB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sizes_are_humanized() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(2048), "2.0 KiB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MiB");
    }
}
