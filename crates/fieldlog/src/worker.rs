//! Worker pool and the per-file retry loop.
//!
//! Each worker takes one path at a time off the queue and owns that file until
//! it ends up processed or error. Attempts for one file run one after another
//! with a linear backoff between them.

use crate::pipeline::Ingest;
use crate::queue::WorkQueue;
use crate::store::StatusStore;
use fieldlog_db::FileStatus;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, Instrument};

/// How often, and how patiently, a file is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per file, including the first
    pub max_retries: u32,
    /// Wait after failed attempt `n` is `n * backoff_unit`
    pub backoff_unit: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_unit: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_unit: Duration) -> Self {
        Self {
            max_retries,
            backoff_unit,
        }
    }

    /// Sleep after the given failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_unit.saturating_mul(attempt)
    }
}

/// Final state of one dequeued file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    Processed { attempts: u32 },
    Failed { attempts: u32, error: String },
}

impl FileOutcome {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Processed { attempts } | Self::Failed { attempts, .. } => *attempts,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, Self::Processed { .. })
    }
}

/// Drive one file to processed or error.
///
/// Status writes that fail are logged and otherwise ignored. Shutdown is not
/// observed here: a file once dequeued always gets its full retry budget.
pub async fn process_file(
    store: &dyn StatusStore,
    ingest: &dyn Ingest,
    path: &Path,
    policy: &RetryPolicy,
) -> FileOutcome {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let max_retries = policy.max_retries.max(1);

    write_status(store, &file, FileStatus::Processing, None).await;

    let mut attempt = 0;
    loop {
        attempt += 1;

        let error = match ingest.attempt(path).await {
            Ok(summary) => {
                write_status(store, &file, FileStatus::Processed, None).await;
                info!(
                    file = %file,
                    attempt,
                    messages = summary.messages,
                    devices = summary.devices,
                    reports_failed = summary.reports_failed,
                    "File processed"
                );
                return FileOutcome::Processed { attempts: attempt };
            }
            Err(e) => e.to_string(),
        };

        error!(
            file = %file,
            attempt,
            max_retries,
            error = %error,
            "Failed to process file"
        );

        if attempt >= max_retries {
            write_status(store, &file, FileStatus::Error, Some(&error)).await;
            error!(file = %file, max_retries, error = %error, "File failed after all retries");
            return FileOutcome::Failed {
                attempts: attempt,
                error,
            };
        }

        let wait = policy.backoff(attempt);
        info!(
            file = %file,
            wait_secs = wait.as_secs_f64(),
            next_attempt = attempt + 1,
            "Retrying file"
        );
        tokio::time::sleep(wait).await;
    }
}

async fn write_status(store: &dyn StatusStore, file: &str, status: FileStatus, error: Option<&str>) {
    if let Err(e) = store.update_file_status(file, status, error).await {
        error!(
            file,
            status = %status,
            error = %format!("{:#}", e),
            "Failed to update file status"
        );
    }
}

/// Files handled by the pool, summed over all workers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Fixed set of workers draining one queue.
pub struct WorkerPool {
    tasks: JoinSet<PoolSummary>,
}

impl WorkerPool {
    pub fn spawn(
        count: usize,
        queue: WorkQueue,
        store: Arc<dyn StatusStore>,
        ingest: Arc<dyn Ingest>,
        policy: RetryPolicy,
        cancel: CancellationToken,
    ) -> Self {
        let mut tasks = JoinSet::new();
        for worker_id in 0..count {
            let span = info_span!("worker", worker_id);
            tasks.spawn(
                worker_loop(
                    worker_id,
                    queue.clone(),
                    store.clone(),
                    ingest.clone(),
                    policy,
                    cancel.clone(),
                )
                .instrument(span),
            );
        }
        info!(count, "Workers started");
        Self { tasks }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Wait for every worker to exit.
    pub async fn join(mut self) -> PoolSummary {
        let mut total = PoolSummary::default();
        while let Some(result) = self.tasks.join_next().await {
            match result {
                Ok(summary) => {
                    total.processed += summary.processed;
                    total.failed += summary.failed;
                }
                Err(e) => error!(error = %e, "Worker task panicked"),
            }
        }
        total
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: WorkQueue,
    store: Arc<dyn StatusStore>,
    ingest: Arc<dyn Ingest>,
    policy: RetryPolicy,
    cancel: CancellationToken,
) -> PoolSummary {
    info!(worker_id, "Worker started");
    let mut summary = PoolSummary::default();

    while let Some(path) = queue.pop(&cancel).await {
        let outcome = process_file(store.as_ref(), ingest.as_ref(), &path, &policy).await;
        if outcome.is_processed() {
            summary.processed += 1;
        } else {
            summary.failed += 1;
        }
    }

    info!(worker_id, "Worker stopped");
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::{AttemptSummary, IngestError};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails the first `failures` attempts, then succeeds.
    struct Flaky {
        failures: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl Ingest for Flaky {
        async fn attempt(&self, _path: &Path) -> Result<AttemptSummary, IngestError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n <= self.failures {
                Err(IngestError::Persist(format!("attempt {} failed", n)))
            } else {
                Ok(AttemptSummary::default())
            }
        }
    }

    fn flaky(failures: u32) -> Flaky {
        Flaky {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    #[test]
    fn test_linear_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
        assert_eq!(policy.backoff(3), Duration::from_secs(6));
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_retry() {
        let store = MemoryStore::new();
        let ingest = flaky(1);
        let outcome = process_file(
            &store,
            &ingest,
            Path::new("/in/a.tsv"),
            &RetryPolicy::default(),
        )
        .await;

        assert_eq!(outcome, FileOutcome::Processed { attempts: 2 });
        assert_eq!(
            store.status_writes(),
            vec![
                ("a.tsv".to_string(), FileStatus::Processing),
                ("a.tsv".to_string(), FileStatus::Processed),
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_retries_mark_error() {
        let store = MemoryStore::new();
        let ingest = flaky(u32::MAX);
        let outcome = process_file(
            &store,
            &ingest,
            Path::new("a.tsv"),
            &RetryPolicy::default(),
        )
        .await;

        assert_eq!(
            outcome,
            FileOutcome::Failed {
                attempts: 3,
                error: "save messages error: attempt 3 failed".to_string(),
            }
        );
        let record = store.status_of("a.tsv").unwrap();
        assert_eq!(record.status, FileStatus::Error);
        assert_eq!(
            record.error_message.as_deref(),
            Some("save messages error: attempt 3 failed")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_write_failure_is_not_fatal() {
        let store = MemoryStore::new();
        store.fail_status_writes(true);
        let outcome = process_file(
            &store,
            &flaky(0),
            Path::new("a.tsv"),
            &RetryPolicy::default(),
        )
        .await;
        assert!(outcome.is_processed());
        assert!(store.status_writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_backoff_finishes_retries_and_queue() {
        let queue = WorkQueue::new(4);
        queue.try_push(PathBuf::from("a.tsv")).unwrap();
        queue.try_push(PathBuf::from("b.tsv")).unwrap();

        let store = Arc::new(MemoryStore::new());
        let ingest = Arc::new(flaky(u32::MAX));
        let cancel = CancellationToken::new();
        let pool = WorkerPool::spawn(
            1,
            queue.clone(),
            store.clone(),
            ingest.clone(),
            RetryPolicy::default(),
            cancel.clone(),
        );

        // first attempt on a.tsv fails at once, then the 2s backoff starts
        tokio::time::sleep(Duration::from_millis(500)).await;
        cancel.cancel();

        let summary = pool.join().await;
        assert_eq!(summary, PoolSummary { processed: 0, failed: 2 });
        assert_eq!(ingest.calls.load(Ordering::SeqCst), 6);
        assert!(queue.is_empty());
        let a = store.status_of("a.tsv").unwrap();
        assert_eq!(a.status, FileStatus::Error);
        assert_eq!(
            a.error_message.as_deref(),
            Some("save messages error: attempt 3 failed")
        );
        let b = store.status_of("b.tsv").unwrap();
        assert_eq!(b.status, FileStatus::Error);
        assert_eq!(
            b.error_message.as_deref(),
            Some("save messages error: attempt 6 failed")
        );
    }

    #[tokio::test]
    async fn test_pool_drains_closed_queue() {
        let queue = WorkQueue::new(8);
        for i in 0..5 {
            queue.try_push(PathBuf::from(format!("{}.tsv", i))).unwrap();
        }
        queue.close();

        let store = Arc::new(MemoryStore::new());
        let pool = WorkerPool::spawn(
            3,
            queue,
            store.clone(),
            Arc::new(flaky(0)),
            RetryPolicy::default(),
            CancellationToken::new(),
        );
        assert_eq!(pool.len(), 3);

        let summary = pool.join().await;
        assert_eq!(summary, PoolSummary { processed: 5, failed: 0 });
        assert_eq!(store.all_processed_files().await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_pool_exits_on_cancel() {
        let cancel = CancellationToken::new();
        let pool = WorkerPool::spawn(
            2,
            WorkQueue::new(1),
            Arc::new(MemoryStore::new()),
            Arc::new(flaky(0)),
            RetryPolicy::default(),
            cancel.clone(),
        );
        cancel.cancel();
        let summary = tokio::time::timeout(Duration::from_secs(1), pool.join())
            .await
            .unwrap();
        assert_eq!(summary, PoolSummary::default());
    }
}
