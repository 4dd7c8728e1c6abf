//! Init-config command - Write the default configuration

use crate::cli::error::HelpfulError;
use anyhow::Result;
use fieldlog::AppConfig;
use std::path::PathBuf;

#[derive(Debug)]
pub struct InitConfigArgs {
    pub path: PathBuf,
    pub force: bool,
}

pub fn run(args: InitConfigArgs) -> Result<()> {
    if args.path.exists() && !args.force {
        return Err(HelpfulError::new("Config file already exists")
            .with_context(format!("Path: {}", args.path.display()))
            .with_suggestion("TRY: Pass --force to overwrite it")
            .into());
    }

    AppConfig::default().save(&args.path)?;
    println!("Wrote default config to {}", args.path.display());
    Ok(())
}
