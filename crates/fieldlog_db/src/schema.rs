//! Database schema creation for all fieldlog tables.
//!
//! All timestamps are stored as INTEGER milliseconds since the Unix epoch.

use crate::error::Result;
use crate::FieldlogDb;
use tracing::debug;

impl FieldlogDb {
    /// Ensure all tables exist.
    pub(crate) async fn ensure_schema(&self) -> Result<()> {
        self.create_file_tables().await?;
        self.create_message_tables().await?;

        debug!("Database schema verified");
        Ok(())
    }

    async fn create_file_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS processed_files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                file_name TEXT NOT NULL UNIQUE,
                status TEXT NOT NULL DEFAULT 'processing'
                    CHECK (status IN ('processing', 'processed', 'error')),
                error_message TEXT,
                processed_at INTEGER,
                created_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_processed_files_status ON processed_files(status)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_processed_files_processed_at ON processed_files(processed_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn create_message_tables(&self) -> Result<()> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS device_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                number INTEGER NOT NULL DEFAULT 0,
                mqtt TEXT NOT NULL DEFAULT '',
                invid TEXT NOT NULL DEFAULT '',
                unit_guid TEXT NOT NULL,
                message_id TEXT NOT NULL DEFAULT '',
                message_text TEXT NOT NULL DEFAULT '',
                context TEXT NOT NULL DEFAULT '',
                message_class TEXT NOT NULL DEFAULT '',
                level INTEGER NOT NULL DEFAULT 0,
                area TEXT NOT NULL DEFAULT '',
                address TEXT NOT NULL DEFAULT '',
                created_at INTEGER NOT NULL
            )"#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_device_messages_unit_guid ON device_messages(unit_guid)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_device_messages_created_at ON device_messages(created_at)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_device_messages_invid ON device_messages(invid)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_device_messages_message_class ON device_messages(message_class)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
