//! Per-device summary reports.
//!
//! A report is rebuilt from the device's full history every time new messages
//! arrive for it and replaces the previous file in one rename.

use crate::store::StatusStore;
use chrono::{DateTime, Utc};
use comfy_table::{presets::ASCII_FULL, ContentArrangement, Table};
use fieldlog_db::DeviceMessage;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Rows listed in the report table.
pub const MAX_TABLE_ROWS: usize = 30;

/// Character limit for message text in the table.
pub const MESSAGE_TEXT_LIMIT: usize = 30;

/// Character limit for controller addresses in the table.
pub const ADDRESS_LIMIT: usize = 25;

const ELLIPSIS: &str = "...";

pub const REPORT_EXTENSION: &str = "txt";

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("invalid device id {0:?}")]
    InvalidDeviceId(String),

    #[error("failed to load history for {unit_guid}: {source}")]
    History {
        unit_guid: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to write report {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Shorten `text` to at most `max` characters, ending in `...` when cut.
pub fn truncate_text(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let keep = max.saturating_sub(ELLIPSIS.len());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ELLIPSIS);
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReportRow {
    /// 1-based position, newest message first
    pub index: usize,
    pub message: String,
    pub class: String,
    pub level: i64,
    pub address: String,
}

/// Everything a rendered report shows.
#[derive(Debug, Clone)]
pub struct DeviceReport {
    pub unit_guid: String,
    /// Inventory id of the newest message
    pub invid: Option<String>,
    pub total: usize,
    pub generated_at: DateTime<Utc>,
    pub rows: Vec<ReportRow>,
    /// Messages left out of the table
    pub remaining: usize,
}

impl DeviceReport {
    /// Build from a newest-first history.
    pub fn build(unit_guid: &str, history: &[DeviceMessage], generated_at: DateTime<Utc>) -> Self {
        let rows = history
            .iter()
            .take(MAX_TABLE_ROWS)
            .enumerate()
            .map(|(i, msg)| ReportRow {
                index: i + 1,
                message: truncate_text(&msg.message_text, MESSAGE_TEXT_LIMIT),
                class: msg.message_class.to_string(),
                level: msg.level,
                address: truncate_text(&msg.address, ADDRESS_LIMIT),
            })
            .collect();

        Self {
            unit_guid: unit_guid.to_string(),
            invid: history.first().map(|m| m.invid.clone()),
            total: history.len(),
            generated_at,
            rows,
            remaining: history.len().saturating_sub(MAX_TABLE_ROWS),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        let invid = self.invid.as_deref().filter(|i| !i.is_empty()).unwrap_or("-");

        // Writing into a String cannot fail.
        let _ = writeln!(out, "Device report");
        let _ = writeln!(out, "Unit GUID:      {}", self.unit_guid);
        let _ = writeln!(out, "Inventory id:   {}", invid);
        let _ = writeln!(out, "Total messages: {}", self.total);
        let _ = writeln!(
            out,
            "Generated:      {}",
            self.generated_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        out.push('\n');

        let mut table = Table::new();
        table
            .load_preset(ASCII_FULL)
            .set_content_arrangement(ContentArrangement::Disabled)
            .set_header(vec!["#", "Message", "Class", "Level", "Address"]);
        for row in &self.rows {
            table.add_row(vec![
                row.index.to_string(),
                row.message.clone(),
                row.class.clone(),
                row.level.to_string(),
                row.address.clone(),
            ]);
        }
        let _ = writeln!(out, "{}", table);

        if self.remaining > 0 {
            let _ = writeln!(out, "+ {} more messages", self.remaining);
        }
        out
    }
}

/// Regenerates device reports from the store's history.
#[derive(Clone)]
pub struct ReportAggregator {
    store: Arc<dyn StatusStore>,
    output_dir: PathBuf,
}

impl ReportAggregator {
    pub fn new(store: Arc<dyn StatusStore>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            output_dir: output_dir.into(),
        }
    }

    /// Where the report for `unit_guid` lives.
    pub fn report_path(&self, unit_guid: &str) -> Result<PathBuf, ReportError> {
        validate_device_id(unit_guid)?;
        Ok(self
            .output_dir
            .join(format!("{}.{}", unit_guid, REPORT_EXTENSION)))
    }

    /// Rebuild the report for one device from its full history.
    pub async fn regenerate(&self, unit_guid: &str) -> Result<PathBuf, ReportError> {
        let path = self.report_path(unit_guid)?;

        let history = self
            .store
            .all_messages_by_device(unit_guid)
            .await
            .map_err(|source| ReportError::History {
                unit_guid: unit_guid.to_string(),
                source,
            })?;

        let report = DeviceReport::build(unit_guid, &history, Utc::now());
        write_replacing(&path, report.render().as_bytes()).await?;

        debug!(
            unit_guid,
            messages = report.total,
            path = %path.display(),
            "Report written"
        );
        Ok(path)
    }
}

fn validate_device_id(unit_guid: &str) -> Result<(), ReportError> {
    let bad = unit_guid.is_empty()
        || unit_guid == "."
        || unit_guid == ".."
        || unit_guid.contains(|c: char| matches!(c, '/' | '\\' | '\0'));
    if bad {
        return Err(ReportError::InvalidDeviceId(unit_guid.to_string()));
    }
    Ok(())
}

/// Write to a sibling temp file, then rename over `path`.
async fn write_replacing(path: &Path, contents: &[u8]) -> Result<(), ReportError> {
    let write_err = |source| ReportError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    tokio::fs::create_dir_all(dir).await.map_err(write_err)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let tmp = dir.join(format!(
        ".{}.{}.{}.tmp",
        file_name,
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    if let Err(e) = tokio::fs::write(&tmp, contents).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(write_err(e));
    }
    if let Err(e) = tokio::fs::rename(&tmp, path).await {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(write_err(e));
    }
    Ok(())
}
