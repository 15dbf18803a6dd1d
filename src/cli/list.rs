//! `packup list`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::core::PackageKind;
use crate::registry::installed::{self, InstalledPackage};
use crate::registry::PackageDescriptor;
use crate::upgrade::{self, UpdateReport};

use super::common::CommandContext;

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Restrict the listing to plugins or themes
    #[arg(long, value_enum)]
    pub kind: Option<PackageKind>,

    /// Skip the repository check for available updates
    #[arg(long)]
    pub no_remote: bool,
}

/// How one installed package relates to the repository index.
#[derive(Debug, PartialEq)]
enum RemoteStatus {
    Update(String),
    Current,
    Unknown,
}

/// Status for a package, matching the index by slug or by display name so
/// installs under a renamed directory still resolve.
fn remote_status(
    pkg: &InstalledPackage,
    available: &[PackageDescriptor],
    report: &UpdateReport,
) -> RemoteStatus {
    if let Some(update) = report
        .updatable
        .values()
        .find(|u| u.slug == pkg.slug || u.name == pkg.name)
    {
        return RemoteStatus::Update(update.new_version.clone());
    }
    if available.iter().any(|d| d.slug == pkg.slug || d.name == pkg.name) {
        RemoteStatus::Current
    } else {
        RemoteStatus::Unknown
    }
}

impl ListArgs {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let kinds: Vec<PackageKind> = match self.kind {
            Some(kind) => vec![kind],
            None => vec![PackageKind::Plugin, PackageKind::Theme],
        };

        let mut any = false;
        for kind in kinds {
            let packages = installed::scan(ctx.package_root(kind)).await?;
            if packages.is_empty() {
                continue;
            }
            any = true;

            let available = if self.no_remote {
                Vec::new()
            } else {
                ctx.registry(kind)?.available_packages().await
            };
            let report = upgrade::evaluate(&available, &packages);

            println!("{}", format!("{kind}s").bold());
            for pkg in &packages {
                let status = match remote_status(pkg, &available, &report) {
                    RemoteStatus::Update(version) => {
                        format!("update available: {version}").yellow().to_string()
                    }
                    RemoteStatus::Current => "up to date".green().to_string(),
                    RemoteStatus::Unknown => String::new(),
                };
                println!("  {:<30} {:<10} {}", pkg.name, pkg.version, status);
            }
            println!();
        }

        if !any {
            println!("No packages installed.");
        }
        Ok(())
    }
}
