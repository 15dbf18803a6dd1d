//! `packup cache`

use anyhow::Result;
use clap::{Args, Subcommand};

use super::common::CommandContext;

#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommands,
}

#[derive(Subcommand, Debug)]
pub enum CacheCommands {
    /// Remove every cached entry
    Clear,

    /// Print the cache directory path
    Dir,
}

impl CacheArgs {
    pub async fn execute(&self, ctx: &CommandContext) -> Result<()> {
        match self.command {
            CacheCommands::Clear => {
                let removed = ctx.cache.clear().await?;
                println!("Removed {removed} cached entr{}.", if removed == 1 { "y" } else { "ies" });
                Ok(())
            }
            CacheCommands::Dir => {
                println!("{}", ctx.cache.dir().display());
                Ok(())
            }
        }
    }
}
