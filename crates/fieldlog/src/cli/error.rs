//! Helpful error types for CLI commands
//!
//! Every error includes what went wrong and, where possible, what to try next.

use std::fmt;
use std::path::Path;

/// An error with context and suggestions
#[derive(Debug)]
pub struct HelpfulError {
    pub message: String,
    pub context: Option<String>,
    pub suggestions: Vec<String>,
}

impl HelpfulError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            context: None,
            suggestions: Vec::new(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Database file is missing
    pub fn database_not_found(path: &Path) -> Self {
        Self::new("Database not found")
            .with_context(format!("Expected database at: {}", path.display()))
            .with_suggestion("TRY: fieldlog scan-once   # Ingest once to create the database")
            .with_suggestion("TRY: Set database.path in the config file")
    }

    /// Device has no stored messages, or the page is past the end
    pub fn no_messages(unit_guid: &str, page: u32, total: u64) -> Self {
        let err = Self::new(format!("Device not found or no messages: {}", unit_guid));
        if total == 0 {
            err.with_suggestion("TRY: fieldlog status   # Check which files were ingested")
        } else {
            err.with_context(format!("Page {} is past the last page ({} messages)", page, total))
                .with_suggestion(format!("TRY: fieldlog messages {} --page 1", unit_guid))
        }
    }

    /// Config file could not be used
    pub fn bad_config(path: &Path, reason: impl fmt::Display) -> Self {
        Self::new(format!("Cannot use config file {}", path.display()))
            .with_context(reason.to_string())
            .with_suggestion(format!(
                "TRY: fieldlog init-config {}   # Write a fresh default config",
                path.display()
            ))
    }
}

impl fmt::Display for HelpfulError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "ERROR: {}", self.message)?;

        if let Some(ctx) = &self.context {
            writeln!(f, "CONTEXT: {}", ctx)?;
        }

        if !self.suggestions.is_empty() {
            writeln!(f)?;
            for suggestion in &self.suggestions {
                writeln!(f, "  {}", suggestion)?;
            }
        }

        Ok(())
    }
}

impl std::error::Error for HelpfulError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_lists_everything() {
        let err = HelpfulError::new("Something went wrong")
            .with_context("While scanning")
            .with_suggestion("Try again");

        let display = err.to_string();
        assert!(display.contains("ERROR: Something went wrong"));
        assert!(display.contains("CONTEXT: While scanning"));
        assert!(display.contains("  Try again"));
    }

    #[test]
    fn test_database_not_found() {
        let err = HelpfulError::database_not_found(Path::new("/tmp/none.sqlite3"));
        assert!(err.context.unwrap().contains("/tmp/none.sqlite3"));
        assert!(!err.suggestions.is_empty());
    }
}
