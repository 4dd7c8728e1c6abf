//! Fieldlog launcher
//!
//! - `run`: ingestion daemon with graceful shutdown on SIGINT/SIGTERM
//! - `scan-once`: a single scan and drain, for cron-style use
//! - `status`, `messages`, `report`: inspect what has been ingested

use anyhow::Result;
use clap::{Parser, Subcommand};
use fieldlog::AppConfig;
use fieldlog_logging::{init_logging, LogConfig, LogGuard};
use std::path::PathBuf;
use std::process::ExitCode;

mod cli;

use cli::error::HelpfulError;

#[derive(Parser, Debug)]
#[command(
    name = "fieldlog",
    version,
    about = "Ingest field device exports and keep one report per device"
)]
struct Cli {
    /// Path to the TOML config file (defaults are used when omitted)
    #[arg(short, long, global = true, env = "FIELDLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging (info/debug to stderr)
    #[arg(short = 'v', long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Watch the input directory until interrupted
    Run,

    /// Scan once, process every queued file, then exit
    ScanOnce {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List file status records
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a device's messages, newest first
    Messages {
        /// Device GUID
        unit_guid: String,

        /// Page number, starting at 1
        #[arg(long, default_value_t = 1)]
        page: u32,

        /// Messages per page (0 means 10, capped at 100)
        #[arg(long, default_value_t = fieldlog_db::DEFAULT_PAGE_LIMIT)]
        limit: u32,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Rebuild the report for one device
    Report {
        /// Device GUID
        unit_guid: String,
    },

    /// Write a config file with every default filled in
    InitConfig {
        /// Where to write the file
        path: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn run_command(command: Commands, config: &AppConfig) -> Result<()> {
    match command {
        Commands::Run => cli::run::run(config),
        Commands::ScanOnce { json } => cli::scan_once::run(cli::scan_once::ScanOnceArgs { json }, config),
        Commands::Status { json } => cli::status::run(cli::status::StatusArgs { json }, config),
        Commands::Messages {
            unit_guid,
            page,
            limit,
            json,
        } => cli::messages::run(
            cli::messages::MessagesArgs {
                unit_guid,
                page,
                limit,
                json,
            },
            config,
        ),
        Commands::Report { unit_guid } => {
            cli::report::run(cli::report::ReportArgs { unit_guid }, config)
        }
        Commands::InitConfig { path, force } => {
            cli::init_config::run(cli::init_config::InitConfigArgs { path, force })
        }
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<AppConfig> {
    AppConfig::load_or_default(path.map(|p| p.as_path())).map_err(|e| match path {
        Some(p) => HelpfulError::bad_config(p, &e).into(),
        None => e.into(),
    })
}

fn start_logging(config: &AppConfig, verbose: bool) -> Option<LogGuard> {
    let log_config = LogConfig {
        app_name: "fieldlog",
        level: &config.logger.level,
        json: config.logger.json,
        verbose,
    };
    match init_logging(log_config) {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("Warning: failed to initialize logging: {:#}", err);
            None
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // init-config must work even when the configured file is broken
    let config = if matches!(cli.command, Commands::InitConfig { .. }) {
        Ok(AppConfig::default())
    } else {
        load_config(cli.config.as_ref())
    };

    let result = config.and_then(|config| {
        let verbose = cli.verbose || matches!(cli.command, Commands::Run);
        let _log_guard = start_logging(&config, verbose);
        run_command(cli.command, &config)
    });

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{:?}", err);
            ExitCode::from(1)
        }
    }
}
