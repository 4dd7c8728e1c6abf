//! Status command - List file status records

use crate::cli::output::{format_timestamp, print_table_colored, status_color};
use anyhow::Result;
use fieldlog::AppConfig;
use fieldlog_db::{FileStatus, ProcessedFile};
use serde::Serialize;

#[derive(Debug)]
pub struct StatusArgs {
    pub json: bool,
}

#[derive(Debug, Default, Serialize)]
struct StatusCounts {
    total: usize,
    processing: usize,
    processed: usize,
    error: usize,
}

#[derive(Debug, Serialize)]
struct StatusOutput {
    counts: StatusCounts,
    files: Vec<ProcessedFile>,
}

pub fn run(args: StatusArgs, config: &AppConfig) -> Result<()> {
    let rt = super::current_thread_runtime()?;
    rt.block_on(run_async(args, config))
}

async fn run_async(args: StatusArgs, config: &AppConfig) -> Result<()> {
    let db = super::open_existing_db(config).await?;
    let files = db.list_processed_files().await?;
    db.close().await;

    let counts = count(&files);

    if args.json {
        let output = StatusOutput { counts, files };
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!(
        "{} files: {} processed, {} processing, {} error",
        counts.total, counts.processed, counts.processing, counts.error
    );
    if files.is_empty() {
        return Ok(());
    }
    println!();

    let rows = files
        .iter()
        .map(|f| {
            vec![
                (f.file_name.clone(), None),
                (f.status.to_string(), Some(status_color(f.status))),
                (format_timestamp(f.processed_at), None),
                (format_timestamp(Some(f.created_at)), None),
                (f.error_message.clone().unwrap_or_default(), None),
            ]
        })
        .collect();
    print_table_colored(&["File", "Status", "Updated", "First seen", "Error"], rows);

    Ok(())
}

fn count(files: &[ProcessedFile]) -> StatusCounts {
    let mut counts = StatusCounts {
        total: files.len(),
        ..Default::default()
    };
    for file in files {
        match file.status {
            FileStatus::Processing => counts.processing += 1,
            FileStatus::Processed => counts.processed += 1,
            FileStatus::Error => counts.error += 1,
        }
    }
    counts
}
