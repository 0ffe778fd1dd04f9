// kintonesync/src/sync/mod.rs
pub(crate) mod logic;
pub(crate) mod outcome;
pub(crate) mod upsert;

#[cfg(test)]
pub(crate) mod testing;

use anyhow::{Context, Result};

use crate::config::SyncConfig;
use crate::kintone::KintoneClient;
use crate::source::MySqlSource;

pub use logic::BatchReport;

/// Public entry point for the sync process.
///
/// The MySQL connection is opened before the first entity and closed after the
/// last one; a connection failure aborts the run before anything is processed.
pub async fn run_sync_flow(config: &SyncConfig) -> Result<BatchReport> {
    let store = KintoneClient::new(&config.kintone).context("Failed to build the Kintone HTTP client")?;

    let source = MySqlSource::connect(&config.mysql).await.with_context(|| {
        format!(
            "Database connection failed: {}:{}/{}",
            config.mysql.host, config.mysql.port, config.mysql.database
        )
    })?;

    let report = logic::BatchDriver::new(&source, &store)
        .run_batch(&config.entities)
        .await;

    source.close().await;
    Ok(report)
}
