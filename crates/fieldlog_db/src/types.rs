//! Types for every fieldlog database entity.
//!
//! These types are shared by the ingestion pipeline, the CLI, and the report
//! renderer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// File status
// ============================================================================

/// Processing status of an ingested export file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Processing,
    Processed,
    Error,
}

impl FileStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Processing => "processing",
            Self::Processed => "processed",
            Self::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "processing" => Some(Self::Processing),
            "processed" => Some(Self::Processed),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status record for one file, keyed by file name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedFile {
    pub id: i64,
    pub file_name: String,
    pub status: FileStatus,
    pub error_message: Option<String>,
    /// Time of the last status write.
    pub processed_at: Option<DateTime<Utc>>,
    /// Time of the first status write; never changes afterwards.
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Device messages
// ============================================================================

/// Classification tag of a device message.
///
/// Devices occasionally emit tags outside the known set; those are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum MessageClass {
    Alarm,
    Warning,
    #[default]
    Info,
    Event,
    Command,
    Waiting,
    Working,
    Other(String),
}

impl MessageClass {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "alarm" => Self::Alarm,
            "warning" => Self::Warning,
            "info" => Self::Info,
            "event" => Self::Event,
            // firmware exports spell it "comand"
            "command" | "comand" => Self::Command,
            "waiting" => Self::Waiting,
            "working" => Self::Working,
            _ => Self::Other(s.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Alarm => "alarm",
            Self::Warning => "warning",
            Self::Info => "info",
            Self::Event => "event",
            Self::Command => "command",
            Self::Waiting => "waiting",
            Self::Working => "working",
            Self::Other(raw) => raw,
        }
    }
}

impl std::fmt::Display for MessageClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for MessageClass {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for MessageClass {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = <String as Deserialize>::deserialize(deserializer)?;
        Ok(MessageClass::parse(&raw))
    }
}

/// One row of a device export. Append-only once saved.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceMessage {
    /// Sequence number within the export
    pub number: i64,
    /// Transport tag
    pub mqtt: String,
    /// Inventory id
    pub invid: String,
    /// Device GUID
    pub unit_guid: String,
    pub message_id: String,
    pub message_text: String,
    /// Execution context tag
    pub context: String,
    pub message_class: MessageClass,
    /// Severity level
    pub level: i64,
    /// Variable area tag (HR, IR, I, C, ...)
    pub area: String,
    /// Controller address
    pub address: String,
}

/// One page of a device's history, newest first.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePage {
    pub unit_guid: String,
    pub messages: Vec<DeviceMessage>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}

impl MessagePage {
    /// Number of pages needed for `total` rows at `limit` per page.
    pub fn pages(&self) -> u64 {
        if self.limit == 0 {
            return 0;
        }
        self.total.div_ceil(self.limit as u64)
    }
}
