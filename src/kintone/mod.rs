// kintonesync/src/kintone/mod.rs
pub(crate) mod client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::Result;
use crate::record::DestinationRecord;

pub use client::KintoneClient;

/// Status code Kintone answers with on success.
pub const STATUS_OK: u16 = 200;

/// Which app a call targets and the token allowed to touch it.
#[derive(Clone, Copy)]
pub struct AppCredentials<'a> {
    pub app_id: &'a str,
    pub api_token: &'a str,
}

/// Locates the record to update by one of its unique fields
/// instead of Kintone's internal record id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateKey {
    pub field: String,
    pub value: String,
}

/// Error body returned by Kintone on non-success responses.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ErrorDetail {
    pub message: Option<String>,
    pub code: Option<String>,
}

impl ErrorDetail {
    pub fn with_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            code: None,
        }
    }

    /// The remote message, or the status code when there is none.
    pub fn describe(&self, status: u16) -> String {
        let message = match self.message.as_deref().filter(|m| !m.is_empty()) {
            Some(message) => message.to_string(),
            None => format!("HTTP {}", status),
        };
        match &self.code {
            Some(code) => format!("{} [{}]", message, code),
            None => message,
        }
    }
}

/// Raw status plus parsed payload, left for the caller to interpret.
#[derive(Debug, Clone, PartialEq)]
pub struct Response<T> {
    pub status: u16,
    pub body: std::result::Result<T, ErrorDetail>,
}

impl<T> Response<T> {
    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK && self.body.is_ok()
    }

    /// Human-readable failure detail; empty for successful responses.
    pub fn error_message(&self) -> String {
        match &self.body {
            Ok(_) if self.status == STATUS_OK => String::new(),
            Ok(_) => format!("HTTP {}", self.status),
            Err(detail) => detail.describe(self.status),
        }
    }
}

/// Records matching a lookup query.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RemoteLookupResult {
    pub records: Vec<serde_json::Value>,
}

impl RemoteLookupResult {
    pub fn found(&self) -> bool {
        !self.records.is_empty()
    }

    pub fn first(&self) -> Option<&serde_json::Value> {
        self.records.first()
    }
}

/// Acknowledgement of a create or update. Kintone returns `id` only on create.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WriteAck {
    pub id: Option<String>,
    pub revision: Option<String>,
}

/// The remote record service.
///
/// `Err` is reserved for transport failures (connection refused, timeout);
/// any HTTP answer, including errors, comes back as a [`Response`].
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Finds records whose `key_field` equals `business_id` exactly.
    async fn lookup(
        &self,
        app: AppCredentials<'_>,
        key_field: &str,
        business_id: &str,
    ) -> Result<Response<RemoteLookupResult>>;

    async fn create(
        &self,
        app: AppCredentials<'_>,
        record: &DestinationRecord,
    ) -> Result<Response<WriteAck>>;

    /// Updates the record located by `key`. Kintone rejects the call when the
    /// key does not identify exactly one record.
    async fn update(
        &self,
        app: AppCredentials<'_>,
        key: &UpdateKey,
        record: &DestinationRecord,
    ) -> Result<Response<WriteAck>>;
}
