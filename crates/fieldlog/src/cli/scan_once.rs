//! Scan-once command - One scan cycle, then process everything it found

use crate::cli::output::print_table;
use anyhow::Result;
use fieldlog::{AppConfig, IngestService};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug)]
pub struct ScanOnceArgs {
    pub json: bool,
}

#[derive(Debug, Serialize)]
struct ScanOnceOutput {
    discovered: usize,
    eligible: usize,
    enqueued: usize,
    dropped: usize,
    processed: usize,
    failed: usize,
}

pub fn run(args: ScanOnceArgs, config: &AppConfig) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_async(args, config))
}

async fn run_async(args: ScanOnceArgs, config: &AppConfig) -> Result<()> {
    let db = super::open_or_create_db(config).await?;
    let service = IngestService::new(config, Arc::new(db.clone()));
    let (scan, pool) = service.run_once().await?;
    db.close().await;

    let output = ScanOnceOutput {
        discovered: scan.discovered,
        eligible: scan.eligible,
        enqueued: scan.enqueued,
        dropped: scan.dropped,
        processed: pool.processed,
        failed: pool.failed,
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    print_table(
        &["Discovered", "Eligible", "Queued", "Dropped", "Processed", "Failed"],
        vec![vec![
            output.discovered.to_string(),
            output.eligible.to_string(),
            output.enqueued.to_string(),
            output.dropped.to_string(),
            output.processed.to_string(),
            output.failed.to_string(),
        ]],
    );
    if output.dropped > 0 {
        println!(
            "{} files did not fit in the queue (queue_size = {}); run again to pick them up",
            output.dropped, config.application.queue_size
        );
    }
    Ok(())
}
