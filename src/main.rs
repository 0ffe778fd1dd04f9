//! MySQL to Kintone sync tool
//!
//! Reads the configured MySQL result sets and creates or updates the matching
//! Kintone records, keyed by each row's `Id`.

// kintonesync/src/main.rs
mod config;
mod errors;
mod kintone;
mod record;
mod source;
mod sync;

use anyhow::{Context, Result};
use config::SyncConfig;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use sync::BatchReport;
use tracing_subscriber::EnvFilter;

const DEFAULT_ENV_FILE: &str = ".env";

/// Main entry point for the sync tool
#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    match run_app().await {
        Ok(report) => {
            tracing::info!("✅ Sync completed: {}", report);
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!("❌ {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app() -> Result<BatchReport> {
    // An env file named on the command line must exist; the default one may be absent.
    let args: Vec<String> = env::args().collect();
    let (env_path, required) = match args.get(1) {
        Some(path) => (PathBuf::from(path.trim()), true),
        None => (PathBuf::from(DEFAULT_ENV_FILE), false),
    };

    let config = SyncConfig::load(&env_path, required).context("Failed to load sync configuration")?;

    for entity in &config.entities {
        tracing::info!(
            "Entity {}: table {} -> Kintone app {} ({} fields, {} coercion rules)",
            entity.name,
            entity.table,
            entity.app_id,
            entity.destination_fields.len(),
            entity.coercions.len()
        );
    }

    sync::run_sync_flow(&config).await
}
