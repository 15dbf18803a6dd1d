//! `packup template`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use crate::registry::INDEX_TEMPLATE;

use super::common::CommandContext;

#[derive(Args, Debug)]
pub struct TemplateArgs {
    /// Write the template to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl TemplateArgs {
    pub async fn execute(&self, _ctx: &CommandContext) -> Result<()> {
        match &self.output {
            Some(path) => {
                tokio::fs::write(path, INDEX_TEMPLATE)
                    .await
                    .with_context(|| format!("failed to write {}", path.display()))?;
                println!("Wrote index template to {}", path.display());
            }
            None => print!("{INDEX_TEMPLATE}"),
        }
        Ok(())
    }
}
