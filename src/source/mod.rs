// kintonesync/src/source/mod.rs
pub(crate) mod mysql;

use async_trait::async_trait;

use crate::errors::Result;
use crate::record::SourceRow;

pub use mysql::MySqlSource;

/// Executes operator-supplied queries against the source database.
#[async_trait]
pub trait SourceDatabase: Send + Sync {
    /// Runs `query` as-is and returns its rows in result order.
    async fn fetch_rows(&self, query: &str) -> Result<Vec<SourceRow>>;
}
