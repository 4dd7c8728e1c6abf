//! Wires scanner, queue, workers and reports together from an [`AppConfig`].

use crate::config::{AppConfig, ApplicationConfig};
use crate::pipeline::{Ingest, IngestPipeline};
use crate::queue::WorkQueue;
use crate::report::ReportAggregator;
use crate::scanner::{DirectoryScanner, ScanReport};
use crate::store::StatusStore;
use crate::worker::{PoolSummary, RetryPolicy, WorkerPool};
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct IngestService {
    config: ApplicationConfig,
    store: Arc<dyn StatusStore>,
    queue: WorkQueue,
    scanner: DirectoryScanner,
    ingest: Arc<dyn Ingest>,
    policy: RetryPolicy,
}

impl IngestService {
    pub fn new(config: &AppConfig, store: Arc<dyn StatusStore>) -> Self {
        let app = config.application.clone();
        let queue = WorkQueue::new(app.queue_size);
        let scanner = DirectoryScanner::new(
            store.clone(),
            queue.clone(),
            app.input_dir.clone(),
            app.extension.clone(),
        );
        let reports = ReportAggregator::new(store.clone(), app.output_dir.clone());
        let ingest: Arc<dyn Ingest> = Arc::new(IngestPipeline::new(store.clone(), reports));
        let policy = RetryPolicy::new(app.max_retries, app.backoff_unit());

        Self {
            config: app,
            store,
            queue,
            scanner,
            ingest,
            policy,
        }
    }

    /// Run until `cancel` fires. Returns once the scanner and every worker
    /// have stopped.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        self.prepare_dirs().await?;

        info!(
            input = %self.config.input_dir.display(),
            output = %self.config.output_dir.display(),
            workers = self.config.workers,
            max_retries = self.policy.max_retries,
            "Ingestion service starting"
        );

        let pool = self.spawn_pool(cancel.clone());
        self.scanner
            .run(self.config.scan_period(), cancel.clone())
            .await;

        let summary = pool.join().await;
        info!(
            processed = summary.processed,
            failed = summary.failed,
            "Ingestion service stopped"
        );
        Ok(())
    }

    /// One scan, then process everything it queued and return.
    pub async fn run_once(self) -> Result<(ScanReport, PoolSummary)> {
        self.prepare_dirs().await?;

        let report = self.scanner.scan().await;
        self.queue.close();

        let summary = self.spawn_pool(CancellationToken::new()).join().await;
        Ok((report, summary))
    }

    fn spawn_pool(&self, cancel: CancellationToken) -> WorkerPool {
        WorkerPool::spawn(
            self.config.workers,
            self.queue.clone(),
            self.store.clone(),
            self.ingest.clone(),
            self.policy,
            cancel,
        )
    }

    async fn prepare_dirs(&self) -> Result<()> {
        for dir in [&self.config.input_dir, &self.config.output_dir] {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("Failed to create directory {}", dir.display()))?;
        }
        Ok(())
    }
}
