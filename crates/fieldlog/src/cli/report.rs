//! Report command - Rebuild one device report on demand

use anyhow::{Context, Result};
use fieldlog::{AppConfig, ReportAggregator};
use std::sync::Arc;

#[derive(Debug)]
pub struct ReportArgs {
    pub unit_guid: String,
}

pub fn run(args: ReportArgs, config: &AppConfig) -> Result<()> {
    let rt = super::current_thread_runtime()?;
    rt.block_on(run_async(args, config))
}

async fn run_async(args: ReportArgs, config: &AppConfig) -> Result<()> {
    let db = super::open_existing_db(config).await?;
    let aggregator =
        ReportAggregator::new(Arc::new(db.clone()), config.application.output_dir.clone());
    let path = aggregator
        .regenerate(&args.unit_guid)
        .await
        .with_context(|| format!("Failed to build report for {}", args.unit_guid))?;
    db.close().await;

    println!("Report written to {}", path.display());
    Ok(())
}
