//! File status operations.
//!
//! One row per file name. Every write is an upsert so the status record is
//! created implicitly on the first write.

use crate::error::{DbError, Result};
use crate::types::{FileStatus, ProcessedFile};
use crate::FieldlogDb;
use sqlx::Row;
use tracing::debug;

impl FieldlogDb {
    /// Insert or update the status of `file_name`.
    ///
    /// `processed_at` is set to now on every write; `created_at` is kept from
    /// the first write. An empty error string is stored as NULL.
    pub async fn update_file_status(
        &self,
        file_name: &str,
        status: FileStatus,
        error: Option<&str>,
    ) -> Result<()> {
        let now = Self::now_millis();
        let error = error.filter(|e| !e.is_empty());

        sqlx::query(
            r#"
            INSERT INTO processed_files (file_name, status, error_message, processed_at, created_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(file_name) DO UPDATE SET
                status = excluded.status,
                error_message = excluded.error_message,
                processed_at = excluded.processed_at
            "#,
        )
        .bind(file_name)
        .bind(status.as_str())
        .bind(error)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        debug!(file = file_name, status = %status, "File status updated");
        Ok(())
    }

    /// Whether any status record exists for `file_name`.
    pub async fn is_file_processed(&self, file_name: &str) -> Result<bool> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM processed_files WHERE file_name = ?")
            .bind(file_name)
            .fetch_one(&self.pool)
            .await?;
        Ok(count > 0)
    }

    /// Get the status record of one file.
    pub async fn get_file_status(&self, file_name: &str) -> Result<Option<ProcessedFile>> {
        let row = sqlx::query(
            "SELECT id, file_name, status, error_message, processed_at, created_at FROM processed_files WHERE file_name = ?",
        )
        .bind(file_name)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(row_to_processed_file).transpose()
    }

    /// List every status record, most recently written first.
    pub async fn list_processed_files(&self) -> Result<Vec<ProcessedFile>> {
        let rows = sqlx::query(
            "SELECT id, file_name, status, error_message, processed_at, created_at FROM processed_files ORDER BY processed_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_processed_file).collect()
    }
}

fn row_to_processed_file(row: &sqlx::sqlite::SqliteRow) -> Result<ProcessedFile> {
    let status_raw: String = row.get("status");
    let status = FileStatus::parse(&status_raw)
        .ok_or_else(|| DbError::invalid_state(format!("Unknown file status '{}'", status_raw)))?;

    Ok(ProcessedFile {
        id: row.get("id"),
        file_name: row.get("file_name"),
        status,
        error_message: row.get("error_message"),
        processed_at: row
            .get::<Option<i64>, _>("processed_at")
            .map(FieldlogDb::millis_to_datetime),
        created_at: FieldlogDb::millis_to_datetime(row.get("created_at")),
    })
}
