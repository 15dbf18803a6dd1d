//! `packup outdated`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use tracing::warn;

use crate::constants::CACHE_KEY_OUTDATED_COUNT;
use crate::core::PackageKind;
use crate::registry::installed;
use crate::upgrade;

use super::common::CommandContext;

#[derive(Args, Debug)]
pub struct OutdatedArgs {
    /// Restrict the check to plugins or themes
    #[arg(long, value_enum)]
    pub kind: Option<PackageKind>,

    /// Ignore the cached index and query the repository again
    #[arg(long)]
    pub force: bool,
}

impl OutdatedArgs {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let kinds: Vec<PackageKind> = match self.kind {
            Some(kind) => vec![kind],
            None => vec![PackageKind::Plugin, PackageKind::Theme],
        };

        let mut total_updates = 0usize;
        for kind in kinds {
            let registry = ctx.registry(kind)?;
            if self.force {
                registry.invalidate().await?;
            }

            let available = registry.available_packages().await;
            let packages = installed::scan(ctx.package_root(kind)).await?;
            let report = upgrade::evaluate(&available, &packages);
            total_updates += report.update_count();

            if report.update_count() == 0 {
                continue;
            }
            println!("{}", format!("{kind}s with updates").bold());
            for info in report.updatable.values() {
                println!(
                    "  {:<30} {} {} {}",
                    info.name,
                    info.installed_version,
                    "->".dimmed(),
                    info.new_version.yellow()
                );
            }
            println!();
        }

        // The count is persisted so shell prompts and scripts can show a
        // badge without re-querying the repository.
        if let Err(e) = ctx
            .cache
            .set(CACHE_KEY_OUTDATED_COUNT, &total_updates, None)
            .await
        {
            warn!("failed to persist outdated count: {e}");
        }

        if total_updates == 0 {
            println!("{}", "Everything is up to date.".green());
        } else {
            println!(
                "{} package{} can be updated. Run 'packup update --all'.",
                total_updates,
                if total_updates == 1 { "" } else { "s" }
            );
        }
        Ok(())
    }
}
