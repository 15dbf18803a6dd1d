//! `packup install`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::bulk;
use crate::core::PackageKind;

use super::common::CommandContext;

#[derive(Args, Debug)]
pub struct InstallArgs {
    /// Slugs of the packages to install
    #[arg(required = true)]
    pub slugs: Vec<String>,

    /// Install themes instead of plugins
    #[arg(long)]
    pub theme: bool,
}

impl InstallArgs {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let kind = if self.theme { PackageKind::Theme } else { PackageKind::Plugin };
        let installer = ctx.installer()?;

        let bar = ctx.progress_bar(self.slugs.len() as u64);
        let report = bulk::run(
            &self.slugs,
            |slug| {
                let installer = &installer;
                async move {
                    let outcome = installer.perform_update(kind, &slug).await?;
                    Ok(match outcome.old_version {
                        Some(old) => format!("{old} -> {}", outcome.new_version),
                        None => format!("installed {}", outcome.new_version),
                    })
                }
            },
            |index, slug| {
                // Position is the number of completed items, so the bar
                // never claims an item that is still running.
                bar.set_position(index as u64);
                bar.set_message(slug.to_string());
            },
        )
        .await;
        bar.finish_and_clear();

        for result in &report.results {
            if result.success {
                println!("{} {}: {}", "ok".green(), result.slug, result.message);
            } else {
                eprintln!("{} {}: {}", "failed".red(), result.slug, result.message);
            }
        }
        println!("{}/{} installed.", report.success_count(), report.total());

        if report.all_succeeded() {
            Ok(())
        } else {
            anyhow::bail!("{} of {} packages failed", report.failure_count(), report.total())
        }
    }
}
