//! Command-line interface.
//!
//! Each subcommand lives in its own module as an `Args` struct with an
//! `execute` method; this module defines the top-level [`Cli`] parser and
//! dispatches to them.

pub mod backup;
pub mod cache;
pub mod common;
pub mod config;
pub mod info;
pub mod install;
pub mod list;
pub mod outdated;
pub mod template;
pub mod update;
pub mod upgrade;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

/// Installer and updater for packages from a private repository.
#[derive(Parser, Debug)]
#[command(name = "packup", version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Path to the config file (overrides PACKUP_CONFIG and the default)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Disable progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List installed packages
    List(list::ListArgs),

    /// Show packages with updates available
    Outdated(outdated::OutdatedArgs),

    /// Show details for one package
    Info(info::InfoArgs),

    /// Install packages from the repository
    Install(install::InstallArgs),

    /// Update installed packages to the repository version
    Update(update::UpdateArgs),

    /// Create, list, and restore backups
    Backup(backup::BackupArgs),

    /// Manage the local cache
    Cache(cache::CacheArgs),

    /// Show or change configuration
    Config(config::ConfigArgs),

    /// Print a sample repository index document
    Template(template::TemplateArgs),

    /// Update packup itself from GitHub releases
    Upgrade(upgrade::UpgradeArgs),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        let ctx = common::CommandContext::load(self.config.as_deref(), self.no_progress).await?;
        match self.command {
            Commands::List(args) => args.execute(&ctx).await,
            Commands::Outdated(args) => args.execute(&ctx).await,
            Commands::Info(args) => args.execute(&ctx).await,
            Commands::Install(args) => args.execute(&ctx).await,
            Commands::Update(args) => args.execute(&ctx).await,
            Commands::Backup(args) => args.execute(&ctx).await,
            Commands::Cache(args) => args.execute(&ctx).await,
            Commands::Config(args) => args.execute(&ctx).await,
            Commands::Template(args) => args.execute(&ctx).await,
            Commands::Upgrade(args) => args.execute(&ctx).await,
        }
    }
}
