//! Chime - CalDAV-backed meeting reminders delivered over Mattermost
//!
//! Main entry point for the reminder daemon.

mod context;

use std::process::ExitCode;

use chime_domain::{ChimeError, Result};
use tracing::{error, info, warn};

use crate::context::AppContext;

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging FIRST so we can see .env loading
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    // Load environment variables from .env file
    match dotenvy::dotenv() {
        Ok(path) => info!(path = %path.display(), "Loaded .env file"),
        Err(e) => warn!(error = %e, "Could not load .env file"),
    }

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Chime exited with an error");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let config = chime_infra::config::load()?;
    let ctx = AppContext::start(config).await?;
    info!("Chime started; press Ctrl-C to stop");

    tokio::signal::ctrl_c().await.map_err(|e| {
        ChimeError::Internal(format!("Failed to listen for shutdown signal: {}", e))
    })?;

    info!("Shutdown signal received");
    ctx.shutdown().await
}
