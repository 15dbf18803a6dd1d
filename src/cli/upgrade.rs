//! `packup upgrade`
//!
//! Updates the packup binary itself from GitHub releases.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use crate::upgrade::readme;
use crate::upgrade::self_updater::SelfUpdater;
use crate::upgrade::version_check::{format_version_info, VersionChecker};

use super::common::CommandContext;

#[derive(Args, Debug)]
pub struct UpgradeArgs {
    /// Only check whether a newer release exists
    #[arg(long)]
    pub check: bool,

    /// Show the cached release status without querying GitHub
    #[arg(long, conflicts_with = "check")]
    pub status: bool,

    /// Show the changelog from the repository readme
    #[arg(long)]
    pub changelog: bool,

    /// Reinstall even when no newer release exists
    #[arg(long)]
    pub force: bool,

    /// Put the previous executable back after a bad upgrade
    #[arg(long, conflicts_with_all = ["check", "status", "changelog", "force"])]
    pub rollback: bool,

    /// Skip the executable backup before replacing it
    #[arg(long)]
    pub no_backup: bool,
}

impl UpgradeArgs {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let current = env!("CARGO_PKG_VERSION");
        let checker = VersionChecker::new(
            ctx.cache.clone(),
            current,
            ctx.config.upgrade.check_interval,
        );

        if self.rollback {
            let target = std::env::current_exe().context("failed to locate the running executable")?;
            if crate::upgrade::exe_backup::rollback(&target).await? {
                checker.clear_cache().await?;
                println!("{}", "Rolled back to the previous executable.".green());
            } else {
                println!("No previous executable to roll back to.");
            }
            return Ok(());
        }

        if self.changelog {
            let text = readme::fetch_readme().await?;
            let sections = readme::parse_sections(&text);
            match sections.changelog {
                Some(changelog) => println!("{}", readme::markdown_lite(&changelog)),
                None => println!("No changelog published."),
            }
            return Ok(());
        }

        if self.status {
            let record = checker.check(false).await?;
            println!("{}", format_version_info(&record));
            return Ok(());
        }

        if self.check {
            let record = checker.check_now().await?;
            println!("{}", format_version_info(&record));
            return Ok(());
        }

        let updater = SelfUpdater::new(current, self.force)?;
        let Some(release) = updater.check_for_update().await? else {
            println!("{}", format!("packup {current} is already the latest version.").green());
            return Ok(());
        };

        println!("Updating packup {current} -> {}", release.version.yellow());
        let target = std::env::current_exe().context("failed to locate the running executable")?;
        let backup_first = ctx.config.upgrade.backup_before_upgrade && !self.no_backup;
        updater.apply(&release, &target, backup_first).await?;

        // The cached release record now describes the old binary.
        checker.clear_cache().await?;

        if let Some(notes) = release.notes.filter(|n| !n.trim().is_empty()) {
            println!("\n{}", "Release notes".bold());
            println!("{notes}");
        }
        println!("{}", format!("packup is now at {}.", release.version).green());
        Ok(())
    }
}
