//! Status Store capability.
//!
//! The scanner and the workers only see this trait. Production wires in
//! [`FieldlogDb`]; tests use [`MemoryStore`].

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use fieldlog_db::{DeviceMessage, FieldlogDb, FileStatus, ProcessedFile};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

/// Durable file status and device message history.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// True when any status record exists for `file_name`.
    async fn is_file_processed(&self, file_name: &str) -> Result<bool>;

    async fn all_processed_files(&self) -> Result<Vec<ProcessedFile>>;

    /// Upsert keyed by file name.
    async fn update_file_status(
        &self,
        file_name: &str,
        status: FileStatus,
        error: Option<&str>,
    ) -> Result<()>;

    /// Batch append. Empty input succeeds without touching storage.
    async fn save_messages(&self, messages: &[DeviceMessage]) -> Result<()>;

    /// Full history of one device, newest first.
    async fn all_messages_by_device(&self, unit_guid: &str) -> Result<Vec<DeviceMessage>>;
}

#[async_trait]
impl StatusStore for FieldlogDb {
    async fn is_file_processed(&self, file_name: &str) -> Result<bool> {
        FieldlogDb::is_file_processed(self, file_name)
            .await
            .with_context(|| format!("Failed to look up status of {}", file_name))
    }

    async fn all_processed_files(&self) -> Result<Vec<ProcessedFile>> {
        self.list_processed_files()
            .await
            .context("Failed to list file status records")
    }

    async fn update_file_status(
        &self,
        file_name: &str,
        status: FileStatus,
        error: Option<&str>,
    ) -> Result<()> {
        FieldlogDb::update_file_status(self, file_name, status, error)
            .await
            .with_context(|| format!("Failed to mark {} as {}", file_name, status))
    }

    async fn save_messages(&self, messages: &[DeviceMessage]) -> Result<()> {
        FieldlogDb::save_messages(self, messages)
            .await
            .with_context(|| format!("Failed to save {} messages", messages.len()))
    }

    async fn all_messages_by_device(&self, unit_guid: &str) -> Result<Vec<DeviceMessage>> {
        self.messages_by_device(unit_guid)
            .await
            .with_context(|| format!("Failed to load history for {}", unit_guid))
    }
}

// ============================================================================
// In-memory store
// ============================================================================

#[derive(Default)]
struct MemoryState {
    files: Vec<ProcessedFile>,
    /// Insertion order; reads reverse it to get newest first.
    messages: Vec<DeviceMessage>,
    status_writes: Vec<(String, FileStatus)>,
    failing_history: HashSet<String>,
    next_id: i64,
}

/// In-memory [`StatusStore`] with switchable failures.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<MemoryState>,
    fail_saves: AtomicBool,
    fail_status_writes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every `save_messages` call fail until switched off.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Make every `update_file_status` call fail until switched off.
    pub fn fail_status_writes(&self, fail: bool) {
        self.fail_status_writes.store(fail, Ordering::SeqCst);
    }

    /// Make history lookups for one device fail.
    pub fn fail_history_for(&self, unit_guid: &str) {
        self.lock().failing_history.insert(unit_guid.to_string());
    }

    /// Every successful status write, in order.
    pub fn status_writes(&self) -> Vec<(String, FileStatus)> {
        self.lock().status_writes.clone()
    }

    pub fn status_of(&self, file_name: &str) -> Option<ProcessedFile> {
        self.lock()
            .files
            .iter()
            .find(|f| f.file_name == file_name)
            .cloned()
    }

    pub fn message_count(&self) -> usize {
        self.lock().messages.len()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // A panicking test thread must not hide the state from the assertions.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn is_file_processed(&self, file_name: &str) -> Result<bool> {
        Ok(self.lock().files.iter().any(|f| f.file_name == file_name))
    }

    async fn all_processed_files(&self) -> Result<Vec<ProcessedFile>> {
        let mut files = self.lock().files.clone();
        files.sort_by(|a, b| b.processed_at.cmp(&a.processed_at).then(b.id.cmp(&a.id)));
        Ok(files)
    }

    async fn update_file_status(
        &self,
        file_name: &str,
        status: FileStatus,
        error: Option<&str>,
    ) -> Result<()> {
        if self.fail_status_writes.load(Ordering::SeqCst) {
            return Err(anyhow!("status store unavailable"));
        }

        let now = Utc::now();
        let error_message = error.filter(|e| !e.is_empty()).map(str::to_string);
        let mut state = self.lock();

        match state.files.iter_mut().find(|f| f.file_name == file_name) {
            Some(existing) => {
                existing.status = status;
                existing.error_message = error_message;
                existing.processed_at = Some(now);
            }
            None => {
                state.next_id += 1;
                let id = state.next_id;
                state.files.push(ProcessedFile {
                    id,
                    file_name: file_name.to_string(),
                    status,
                    error_message,
                    processed_at: Some(now),
                    created_at: now,
                });
            }
        }
        state.status_writes.push((file_name.to_string(), status));
        Ok(())
    }

    async fn save_messages(&self, messages: &[DeviceMessage]) -> Result<()> {
        if messages.is_empty() {
            return Ok(());
        }
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(anyhow!("message store unavailable"));
        }
        self.lock().messages.extend_from_slice(messages);
        Ok(())
    }

    async fn all_messages_by_device(&self, unit_guid: &str) -> Result<Vec<DeviceMessage>> {
        let state = self.lock();
        if state.failing_history.contains(unit_guid) {
            return Err(anyhow!("history unavailable for {}", unit_guid));
        }
        Ok(state
            .messages
            .iter()
            .rev()
            .filter(|m| m.unit_guid == unit_guid)
            .cloned()
            .collect())
    }
}

/// Map file name to its current status.
pub fn status_index(files: &[ProcessedFile]) -> HashMap<String, FileStatus> {
    files
        .iter()
        .map(|f| (f.file_name.clone(), f.status))
        .collect()
}
