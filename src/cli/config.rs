//! `packup config`

use anyhow::{Context, Result};
use clap::{Args, Subcommand};

use crate::config::GlobalConfig;
use crate::constants::DEFAULT_REPO_URL;

use super::common::CommandContext;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: Option<ConfigCommands>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show,

    /// Set the plugin repository URL
    SetRepo { url: String },

    /// Set a separate theme repository URL
    SetThemesRepo { url: String },

    /// Reset repository URLs to the built-in default
    ResetRepo,
}

impl ConfigArgs {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match &self.command {
            None | Some(ConfigCommands::Show) => {
                let rendered =
                    toml::to_string_pretty(&ctx.config).context("failed to render config")?;
                print!("{rendered}");
                Ok(())
            }
            Some(ConfigCommands::SetRepo { url }) => {
                self.update(ctx, |config| config.repo.url = url.trim().to_string()).await
            }
            Some(ConfigCommands::SetThemesRepo { url }) => {
                self.update(ctx, |config| config.repo.themes_url = Some(url.trim().to_string()))
                    .await
            }
            Some(ConfigCommands::ResetRepo) => {
                self.update(ctx, |config| {
                    config.repo.url = DEFAULT_REPO_URL.to_string();
                    config.repo.themes_url = None;
                })
                .await
            }
        }
    }

    async fn update(
        &self,
        ctx: &CommandContext,
        mutate: impl FnOnce(&mut GlobalConfig),
    ) -> Result<()> {
        let mut config = ctx.config.clone();
        mutate(&mut config);
        config.save_to(&ctx.config_path).await?;

        // Repository URLs changed, so any cached index is for the wrong
        // repository.
        ctx.cache.delete(crate::constants::CACHE_KEY_PLUGIN_INDEX).await?;
        ctx.cache.delete(crate::constants::CACHE_KEY_THEME_INDEX).await?;
        println!("Configuration saved.");
        Ok(())
    }
}
