//! `packup info`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use crate::core::PackageKind;
use crate::registry::installed;
use crate::version;

use super::common::CommandContext;

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Package slug to look up
    pub slug: String,

    /// Look the slug up as a theme instead of a plugin
    #[arg(long)]
    pub theme: bool,
}

impl InfoArgs {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        let kind = if self.theme { PackageKind::Theme } else { PackageKind::Plugin };

        let descriptor = ctx.registry(kind)?.find_package(&self.slug).await;
        let packages = installed::scan(ctx.package_root(kind)).await?;
        let local = match &descriptor {
            Some(d) => installed::find_installed(&packages, &d.slug, &d.name),
            None => packages.iter().find(|p| p.slug == self.slug),
        };

        if descriptor.is_none() && local.is_none() {
            anyhow::bail!("package '{}' is neither installed nor in the repository", self.slug);
        }

        let name = descriptor
            .as_ref()
            .map(|d| d.name.as_str())
            .or(local.map(|p| p.name.as_str()))
            .unwrap_or(&self.slug);
        println!("{} ({kind})", name.bold());

        if let Some(pkg) = local {
            println!("  installed: {}", pkg.version);
        } else {
            println!("  installed: {}", "no".dimmed());
        }

        if let Some(d) = &descriptor {
            println!("  repository: {}", d.version);
            if let Some(pkg) = local {
                if version::is_newer(&d.version, &pkg.version) {
                    println!("  {}", format!("update available: {}", d.version).yellow());
                }
            }
            if let Some(url) = &d.info_url {
                println!("  url: {url}");
            }
            if let Some(description) = &d.description {
                println!("\n{description}");
            }
            if let Some(changelog) = &d.changelog {
                println!("\n{}", "Changelog".bold());
                println!("{changelog}");
            }
        } else {
            println!("  repository: {}", "not offered".dimmed());
        }
        Ok(())
    }
}
