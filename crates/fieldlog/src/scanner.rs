//! Directory scanner.
//!
//! Each cycle compares the input directory against the stored file statuses
//! and queues every export that has never been seen or previously failed.
//! Files marked processing or processed are left alone; this is the only
//! guard against two workers picking up the same file.

use crate::queue::WorkQueue;
use crate::store::{status_index, StatusStore};
use anyhow::{Context, Result};
use fieldlog_db::FileStatus;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Counts from one scan cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Files with the configured extension
    pub discovered: usize,
    pub eligible: usize,
    pub enqueued: usize,
    /// Eligible files that found the queue full
    pub dropped: usize,
}

/// A file is picked up when it has no status yet or its last run failed.
pub fn is_eligible(status: Option<FileStatus>) -> bool {
    matches!(status, None | Some(FileStatus::Error))
}

pub struct DirectoryScanner {
    store: Arc<dyn StatusStore>,
    queue: WorkQueue,
    input_dir: PathBuf,
    extension: String,
}

impl DirectoryScanner {
    pub fn new(
        store: Arc<dyn StatusStore>,
        queue: WorkQueue,
        input_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            store,
            queue,
            input_dir: input_dir.into(),
            extension: extension.into(),
        }
    }

    /// Run one cycle. Failures are logged and yield an empty report.
    pub async fn scan(&self) -> ScanReport {
        debug!(dir = %self.input_dir.display(), "Scanning input directory");

        let known = match self.store.all_processed_files().await {
            Ok(files) => status_index(&files),
            Err(e) => {
                error!(error = %format!("{:#}", e), "Failed to load file statuses, skipping scan");
                return ScanReport::default();
            }
        };

        let candidates = match self.list_candidates().await {
            Ok(paths) => paths,
            Err(e) => {
                error!(
                    dir = %self.input_dir.display(),
                    error = %format!("{:#}", e),
                    "Failed to read input directory, skipping scan"
                );
                return ScanReport::default();
            }
        };

        let mut report = ScanReport {
            discovered: candidates.len(),
            ..Default::default()
        };

        for path in candidates {
            let file = file_name(&path);
            let status = known.get(&file).copied();
            if !is_eligible(status) {
                continue;
            }
            report.eligible += 1;

            if status == Some(FileStatus::Error) {
                info!(file = %file, "Retrying file that previously failed");
            } else {
                info!(file = %file, "New file found");
            }

            match self.queue.try_push(path) {
                Ok(()) => {
                    report.enqueued += 1;
                    debug!(file = %file, "File queued");
                }
                Err(_) => {
                    report.dropped += 1;
                    warn!(
                        file = %file,
                        queue_size = self.queue.capacity(),
                        "Queue is full, file left for the next scan"
                    );
                }
            }
        }

        info!(
            discovered = report.discovered,
            eligible = report.eligible,
            enqueued = report.enqueued,
            dropped = report.dropped,
            queued = self.queue.len(),
            "Scan completed"
        );
        report
    }

    /// Scan immediately, then once per `period` until cancelled.
    pub async fn run(&self, period: Duration, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            dir = %self.input_dir.display(),
            period_secs = period.as_secs(),
            queue_size = self.queue.capacity(),
            "Scanner started"
        );

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {
                    self.scan().await;
                }
            }
        }

        info!("Scanner stopped");
    }

    async fn list_candidates(&self) -> Result<Vec<PathBuf>> {
        let dir = self.input_dir.clone();
        let extension = self.extension.clone();
        tokio::task::spawn_blocking(move || list_files(&dir, &extension))
            .await
            .context("Directory listing task failed")?
    }
}

/// Regular files directly inside `dir` whose extension matches exactly.
pub fn list_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.with_context(|| format!("Failed to list {}", dir.display()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) == Some(extension) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
