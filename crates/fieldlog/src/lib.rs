//! Fieldlog - Device Export Ingestion
//!
//! Watches a directory for TSV exports written by field devices, stores every
//! message they contain, and keeps one summary report per device up to date.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   Scanner   │     │ Work Queue  │     │ Worker Pool │     │   Reports   │
//! │ (dir diff)  │────▶│  (bounded)  │────▶│ (retry loop)│────▶│ (per device)│
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!        │                                       │
//!        └──────────── Status Store ◀────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Eligible file**: no status yet, or status `error`
//! - **Attempt**: parse, save, rebuild reports for one file
//! - **Backoff**: attempt `n` failing waits `n * backoff_secs` before the next

pub mod config;
pub mod parser;
pub mod pipeline;
pub mod queue;
pub mod report;
pub mod scanner;
pub mod service;
pub mod store;
pub mod worker;

// Re-exports for convenience
pub use config::{AppConfig, ConfigError};
pub use parser::{parse_reader, parse_tsv, MessageIter, ParseError, ParsedFile};
pub use pipeline::{AttemptSummary, Ingest, IngestError, IngestPipeline};
pub use queue::{QueueFull, WorkQueue};
pub use report::{truncate_text, DeviceReport, ReportAggregator, ReportError};
pub use scanner::{is_eligible, DirectoryScanner, ScanReport};
pub use service::IngestService;
pub use store::{MemoryStore, StatusStore};
pub use worker::{process_file, FileOutcome, PoolSummary, RetryPolicy, WorkerPool};
