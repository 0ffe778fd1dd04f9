// kintonesync/src/source/mysql.rs
use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use sqlx::mysql::{MySqlPool, MySqlPoolOptions, MySqlRow};
use sqlx::types::BigDecimal;
use sqlx::{Column, Row};

use super::SourceDatabase;
use crate::config::MySqlSettings;
use crate::errors::Result;
use crate::record::SourceRow;

/// The run's single MySQL connection.
pub struct MySqlSource {
    pool: MySqlPool,
}

impl MySqlSource {
    /// Opens the connection up front so an unreachable server fails the run
    /// before any entity is processed.
    pub async fn connect(settings: &MySqlSettings) -> Result<Self> {
        let pool = MySqlPoolOptions::new()
            .max_connections(1)
            .acquire_timeout(settings.connect_timeout)
            .connect_with(settings.connect_options())
            .await?;
        tracing::info!(
            "Connected to MySQL {}:{}/{}",
            settings.host,
            settings.port,
            settings.database
        );
        Ok(Self { pool })
    }

    pub async fn close(self) {
        self.pool.close().await;
        tracing::info!("MySQL connection closed");
    }
}

#[async_trait]
impl SourceDatabase for MySqlSource {
    async fn fetch_rows(&self, query: &str) -> Result<Vec<SourceRow>> {
        let rows = sqlx::query(query).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(to_source_row).collect())
    }
}

fn to_source_row(row: &MySqlRow) -> SourceRow {
    let mut source_row = SourceRow::new();
    for (index, column) in row.columns().iter().enumerate() {
        source_row.insert(column.name(), column_text(row, index));
    }
    source_row
}

/// Renders a column as text, trying the decodings MySQL columns commonly need.
/// NULL and undecodable values read as `None`.
fn column_text(row: &MySqlRow, index: usize) -> Option<String> {
    if let Ok(val) = row.try_get::<Option<String>, _>(index) {
        return val;
    }
    if let Ok(val) = row.try_get::<Option<i64>, _>(index) {
        return val.map(|v| v.to_string());
    }
    if let Ok(val) = row.try_get::<Option<u64>, _>(index) {
        return val.map(|v| v.to_string());
    }
    if let Ok(val) = row.try_get::<Option<BigDecimal>, _>(index) {
        return val.map(|v| v.to_string());
    }
    if let Ok(val) = row.try_get::<Option<f64>, _>(index) {
        return val.map(|v| v.to_string());
    }
    if let Ok(val) = row.try_get::<Option<NaiveDate>, _>(index) {
        return val.map(|v| v.format("%Y-%m-%d").to_string());
    }
    if let Ok(val) = row.try_get::<Option<NaiveDateTime>, _>(index) {
        return val.map(|v| v.format("%Y-%m-%d %H:%M:%S").to_string());
    }
    if let Ok(val) = row.try_get::<Option<NaiveTime>, _>(index) {
        return val.map(|v| v.format("%H:%M:%S").to_string());
    }
    if let Ok(val) = row.try_get::<Option<serde_json::Value>, _>(index) {
        return val.map(|v| v.to_string());
    }
    if let Ok(val) = row.try_get::<Option<Vec<u8>>, _>(index) {
        return val.map(|v| String::from_utf8_lossy(&v).into_owned());
    }

    tracing::warn!(
        "Column {} has a type that cannot be read as text; sending null",
        row.columns()[index].name()
    );
    None
}
