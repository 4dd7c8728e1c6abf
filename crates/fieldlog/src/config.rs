//! Configuration for the fieldlog service
//!
//! Loaded from a TOML file. Every field has a default, so an empty file (or no
//! file at all) yields a usable configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid TOML in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Failed to serialize config: {0}")]
    Serialize(String),

    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub application: ApplicationConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logger: LoggerConfig,
}

/// Ingestion pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Directory watched for device exports
    #[serde(default = "default_input_dir")]
    pub input_dir: PathBuf,

    /// Directory that receives one report per device
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Seconds between directory scans
    #[serde(default = "default_scan_period")]
    pub scan_period_secs: u64,

    /// Capacity of the pending-file queue
    #[serde(default = "default_queue_size")]
    pub queue_size: usize,

    /// Number of parallel workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Attempts per file before it is marked as an error
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// File extension to pick up, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Backoff unit in seconds; attempt n waits n units
    #[serde(default = "default_backoff")]
    pub backoff_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Filter used when RUST_LOG is unset
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

fn default_input_dir() -> PathBuf {
    PathBuf::from("./input")
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("./reports")
}

fn default_scan_period() -> u64 {
    30
}

fn default_queue_size() -> usize {
    100
}

fn default_workers() -> usize {
    4
}

fn default_max_retries() -> u32 {
    3
}

fn default_extension() -> String {
    "tsv".to_string()
}

fn default_backoff() -> u64 {
    2
}

fn default_database_path() -> PathBuf {
    fieldlog_logging::fieldlog_home().join("fieldlog.sqlite3")
}

fn default_max_connections() -> u32 {
    5
}

fn default_level() -> String {
    "info".to_string()
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            input_dir: default_input_dir(),
            output_dir: default_output_dir(),
            scan_period_secs: default_scan_period(),
            queue_size: default_queue_size(),
            workers: default_workers(),
            max_retries: default_max_retries(),
            extension: default_extension(),
            backoff_secs: default_backoff(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

impl ApplicationConfig {
    pub fn scan_period(&self) -> Duration {
        Duration::from_secs(self.scan_period_secs)
    }

    pub fn backoff_unit(&self) -> Duration {
        Duration::from_secs(self.backoff_secs)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: AppConfig = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        config.expand_paths();
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => {
                let mut config = Self::default();
                config.expand_paths();
                Ok(config)
            }
        }
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                    path: path.to_path_buf(),
                    source,
                })?;
            }
        }
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let app = &self.application;
        let positive: [(&'static str, u64); 5] = [
            ("application.workers", app.workers as u64),
            ("application.queue_size", app.queue_size as u64),
            ("application.max_retries", app.max_retries as u64),
            ("application.scan_period_secs", app.scan_period_secs),
            ("application.backoff_secs", app.backoff_secs),
        ];
        for (field, value) in positive {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be at least 1".to_string(),
                });
            }
        }

        let extension = app.extension.trim_start_matches('.');
        if extension.is_empty() {
            return Err(ConfigError::Invalid {
                field: "application.extension",
                reason: "must not be empty".to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Invalid {
                field: "database.max_connections",
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(())
    }

    fn expand_paths(&mut self) {
        self.application.input_dir = expand_home(&self.application.input_dir);
        self.application.output_dir = expand_home(&self.application.output_dir);
        self.database.path = expand_home(&self.database.path);
        self.application.extension = self
            .application
            .extension
            .trim_start_matches('.')
            .to_string();
    }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    if path.starts_with("~") {
        if let Some(home) = dirs::home_dir() {
            if let Ok(rest) = path.strip_prefix("~") {
                return home.join(rest);
            }
        }
    }
    path.to_path_buf()
}
