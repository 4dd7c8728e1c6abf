//! Run command - Long-running ingestion daemon
//!
//! Stops on SIGINT or SIGTERM. The scanner stops at once; workers drain the
//! queue and give every file they take their full retry budget before exiting.

use anyhow::Result;
use fieldlog::{AppConfig, IngestService};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

pub fn run(config: &AppConfig) -> Result<()> {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_async(config))
}

async fn run_async(config: &AppConfig) -> Result<()> {
    let db = super::open_or_create_db(config).await?;
    let service = IngestService::new(config, Arc::new(db.clone()));

    let cancel = CancellationToken::new();
    spawn_signal_handlers(cancel.clone());

    let result = service.run(cancel).await;
    db.close().await;
    result
}

fn spawn_signal_handlers(cancel: CancellationToken) {
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received shutdown signal");
                ctrl_c_token.cancel();
            }
            Err(err) => error!("Error setting up signal handler: {}", err),
        }
    });

    #[cfg(unix)]
    {
        tokio::spawn(async move {
            use tokio::signal::unix::{signal, SignalKind};
            match signal(SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                    info!("Received SIGTERM signal");
                    cancel.cancel();
                }
                Err(err) => error!("Error setting up SIGTERM handler: {}", err),
            }
        });
    }
}
