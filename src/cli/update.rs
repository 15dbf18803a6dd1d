//! `packup update`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::bulk;
use crate::core::PackageKind;
use crate::registry::installed;
use crate::upgrade;

use super::common::CommandContext;

#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Slugs of the packages to update
    #[arg(required_unless_present = "all", conflicts_with = "all")]
    pub slugs: Vec<String>,

    /// Update every installed package that has an update available
    #[arg(long)]
    pub all: bool,

    /// Update themes instead of plugins
    #[arg(long)]
    pub theme: bool,
}

impl UpdateArgs {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let kind = if self.theme { PackageKind::Theme } else { PackageKind::Plugin };

        let slugs = if self.all {
            let available = ctx.registry(kind)?.available_packages().await;
            let packages = installed::scan(ctx.package_root(kind)).await?;
            let report = upgrade::evaluate(&available, &packages);
            report.updatable.keys().cloned().collect::<Vec<_>>()
        } else {
            self.slugs.clone()
        };

        if slugs.is_empty() {
            println!("{}", "Everything is up to date.".green());
            return Ok(());
        }

        let installer = ctx.installer()?;
        let bar = ctx.progress_bar(slugs.len() as u64);
        let report = bulk::run(
            &slugs,
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
        println!("{}/{} updated.", report.success_count(), report.total());

        if report.all_succeeded() {
            Ok(())
        } else {
            anyhow::bail!("{} of {} packages failed", report.failure_count(), report.total())
        }
    }
}
