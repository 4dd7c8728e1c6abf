//! CLI module for fieldlog
//!
//! `run` and `scan-once` drive the ingestion pipeline. The other commands read
//! the database for inspection or rebuild a report on demand.

pub mod error;
pub mod output;

pub mod init_config;
pub mod messages;
pub mod report;
pub mod run;
pub mod scan_once;
pub mod status;

use crate::cli::error::HelpfulError;
use anyhow::Result;
use fieldlog::AppConfig;
use fieldlog_db::FieldlogDb;

/// Runtime for the short-lived inspection commands
pub(crate) fn current_thread_runtime() -> Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?)
}

/// Open the configured database, creating it if needed
pub(crate) async fn open_or_create_db(config: &AppConfig) -> Result<FieldlogDb> {
    let path = &config.database.path;
    FieldlogDb::open_with(path, config.database.max_connections)
        .await
        .map_err(|e| {
            HelpfulError::new("Failed to open database")
                .with_context(format!("Database: {}", path.display()))
                .with_suggestion(format!("Error: {}", e))
                .with_suggestion("TRY: Check file permissions")
                .into()
        })
}

/// Open the configured database, failing if it does not exist yet
pub(crate) async fn open_existing_db(config: &AppConfig) -> Result<FieldlogDb> {
    let path = &config.database.path;
    if !path.exists() {
        return Err(HelpfulError::database_not_found(path).into());
    }
    FieldlogDb::open_existing(path).await.map_err(|e| {
        HelpfulError::new("Failed to connect to database")
            .with_context(format!("Database: {}", path.display()))
            .with_suggestion(format!("Error: {}", e))
            .with_suggestion("TRY: Ensure database is not locked by another process")
            .into()
    })
}
