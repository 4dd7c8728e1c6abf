//! One processing attempt for one export file.
//!
//! parse -> reject empty -> save all messages -> rebuild the report of every
//! device the file mentions.

use crate::parser::{parse_reader, ParseError};
use crate::report::ReportAggregator;
use crate::store::StatusStore;
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

/// Why an attempt failed. Every variant is retried by the worker.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("no messages found in file")]
    EmptyFile,

    #[error("save messages error: {0}")]
    Persist(String),
}

/// What a successful attempt did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AttemptSummary {
    pub messages: usize,
    pub devices: usize,
    pub reports_written: usize,
    /// Devices whose report could not be rebuilt; never fails the attempt
    pub reports_failed: usize,
}

/// A single processing attempt, retried by the worker on error.
#[async_trait]
pub trait Ingest: Send + Sync {
    async fn attempt(&self, path: &Path) -> Result<AttemptSummary, IngestError>;
}

pub struct IngestPipeline {
    store: Arc<dyn StatusStore>,
    reports: ReportAggregator,
}

impl IngestPipeline {
    pub fn new(store: Arc<dyn StatusStore>, reports: ReportAggregator) -> Self {
        Self { store, reports }
    }
}

#[async_trait]
impl Ingest for IngestPipeline {
    async fn attempt(&self, path: &Path) -> Result<AttemptSummary, IngestError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        let bytes = tokio::fs::read(path)
            .await
            .map_err(|source| ParseError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        let parsed = parse_reader(&file_name, bytes.as_slice())?;
        if parsed.messages.is_empty() {
            return Err(IngestError::EmptyFile);
        }

        self.store
            .save_messages(&parsed.messages)
            .await
            .map_err(|e| IngestError::Persist(format!("{:#}", e)))?;
        info!(
            file = %file_name,
            messages = parsed.messages.len(),
            "Messages saved"
        );

        let devices: BTreeSet<&str> = parsed
            .messages
            .iter()
            .map(|m| m.unit_guid.as_str())
            .collect();

        let mut summary = AttemptSummary {
            messages: parsed.messages.len(),
            devices: devices.len(),
            ..Default::default()
        };

        for unit_guid in devices {
            match self.reports.regenerate(unit_guid).await {
                Ok(report) => {
                    summary.reports_written += 1;
                    info!(
                        unit_guid,
                        path = %report.display(),
                        "Report generated"
                    );
                }
                Err(e) => {
                    summary.reports_failed += 1;
                    warn!(unit_guid, error = %e, "Failed to generate report");
                }
            }
        }

        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use tempfile::TempDir;

    const HEADER: &str = "Export\nn\tmqtt\tinvid\tguid\tid\ttext\tctx\tclass\tlevel\tarea\taddr\n";

    fn write_export(dir: &Path, name: &str, rows: &[(&str, &str)]) -> std::path::PathBuf {
        let mut body = HEADER.to_string();
        for (i, (guid, text)) in rows.iter().enumerate() {
            body.push_str(&format!(
                "{}\tm\tG-1\t{}\tid{}\t{}\tctx\tinfo\t1\tHR\ta{}\n",
                i + 1,
                guid,
                i,
                text,
                i
            ));
        }
        let path = dir.join(name);
        std::fs::write(&path, body).unwrap();
        path
    }

    fn pipeline(store: Arc<MemoryStore>, out: &Path) -> IngestPipeline {
        IngestPipeline::new(store.clone(), ReportAggregator::new(store, out))
    }

    #[tokio::test]
    async fn test_attempt_saves_and_reports() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let path = write_export(
            temp.path(),
            "a.tsv",
            &[("dev-a", "x"), ("dev-b", "y"), ("dev-a", "z")],
        );

        let summary = pipeline(store.clone(), &temp.path().join("out"))
            .attempt(&path)
            .await
            .unwrap();

        assert_eq!(
            summary,
            AttemptSummary {
                messages: 3,
                devices: 2,
                reports_written: 2,
                reports_failed: 0,
            }
        );
        assert_eq!(store.message_count(), 3);
        assert!(temp.path().join("out").join("dev-a.txt").exists());
        assert!(temp.path().join("out").join("dev-b.txt").exists());
    }

    #[tokio::test]
    async fn test_body_without_rows_saves_nothing() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());

        let empty = temp.path().join("empty.tsv");
        std::fs::write(&empty, format!("{}\n\n", HEADER)).unwrap();
        let err = pipeline(store.clone(), temp.path())
            .attempt(&empty)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Parse(ParseError::TooShort { .. })));

        let spaces = temp.path().join("spaces.tsv");
        std::fs::write(&spaces, format!("{}   \n", HEADER)).unwrap();
        let err = pipeline(store.clone(), temp.path())
            .attempt(&spaces)
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Parse(ParseError::ColumnCount { .. })));

        assert_eq!(store.message_count(), 0);
    }

    #[tokio::test]
    async fn test_save_failure_is_persist_error() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.fail_saves(true);
        let path = write_export(temp.path(), "a.tsv", &[("dev-a", "x")]);

        let err = pipeline(store, temp.path()).attempt(&path).await.unwrap_err();
        assert!(matches!(err, IngestError::Persist(_)));
        assert!(err.to_string().starts_with("save messages error"));
    }

    #[tokio::test]
    async fn test_one_bad_device_does_not_fail_attempt() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        store.fail_history_for("dev-a");
        let path = write_export(temp.path(), "a.tsv", &[("dev-a", "x"), ("dev-b", "y")]);

        let summary = pipeline(store, temp.path()).attempt(&path).await.unwrap();
        assert_eq!(summary.reports_failed, 1);
        assert_eq!(summary.reports_written, 1);
        assert!(temp.path().join("dev-b.txt").exists());
        assert!(!temp.path().join("dev-a.txt").exists());
    }

    #[tokio::test]
    async fn test_missing_file_is_parse_error() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryStore::new());
        let err = pipeline(store, temp.path())
            .attempt(&temp.path().join("gone.tsv"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::Parse(ParseError::Open { .. })));
    }
}
