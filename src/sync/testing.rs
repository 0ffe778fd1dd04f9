// kintonesync/src/sync/testing.rs
//! In-memory stand-ins for Kintone and MySQL used by the sync tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::errors::{Result, SyncError};
use crate::kintone::{
    AppCredentials, ErrorDetail, RecordStore, RemoteLookupResult, Response, UpdateKey, WriteAck,
};
use crate::record::{DestinationRecord, SourceRow};
use crate::source::SourceDatabase;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Lookup {
        app_id: String,
        key_field: String,
        business_id: String,
    },
    Create {
        app_id: String,
        record: DestinationRecord,
    },
    Update {
        app_id: String,
        key: UpdateKey,
        record: DestinationRecord,
    },
}

fn unreachable_error() -> SyncError {
    SyncError::UrlParse(url::ParseError::EmptyHost)
}

/// Remembers every call and keeps created records so later lookups find them.
pub struct FakeStore {
    key_field: String,
    records: Mutex<HashMap<String, Vec<DestinationRecord>>>,
    calls: Mutex<Vec<Call>>,
    lookup_failure: Option<(u16, String)>,
    write_failure: Option<(u16, String)>,
    unreachable: bool,
}

impl FakeStore {
    pub fn new(key_field: &str) -> Self {
        Self {
            key_field: key_field.to_string(),
            records: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            lookup_failure: None,
            write_failure: None,
            unreachable: false,
        }
    }

    pub fn with_existing(self, business_id: &str) -> Self {
        self.records
            .lock()
            .unwrap()
            .entry(business_id.to_string())
            .or_default()
            .push(DestinationRecord::new());
        self
    }

    pub fn failing_lookups(mut self, status: u16, message: &str) -> Self {
        self.lookup_failure = Some((status, message.to_string()));
        self
    }

    pub fn failing_writes(mut self, status: u16, message: &str) -> Self {
        self.write_failure = Some((status, message.to_string()));
        self
    }

    pub fn unreachable(mut self) -> Self {
        self.unreachable = true;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn lookup_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Lookup { .. }))
            .count()
    }

    pub fn write_count(&self) -> usize {
        self.calls().len() - self.lookup_count()
    }

    fn write_response(&self) -> Response<WriteAck> {
        match &self.write_failure {
            Some((status, message)) => Response {
                status: *status,
                body: Err(ErrorDetail::with_message(message.as_str())),
            },
            None => Response {
                status: 200,
                body: Ok(WriteAck::default()),
            },
        }
    }
}

#[async_trait]
impl RecordStore for FakeStore {
    async fn lookup(
        &self,
        app: AppCredentials<'_>,
        key_field: &str,
        business_id: &str,
    ) -> Result<Response<RemoteLookupResult>> {
        self.calls.lock().unwrap().push(Call::Lookup {
            app_id: app.app_id.to_string(),
            key_field: key_field.to_string(),
            business_id: business_id.to_string(),
        });
        if self.unreachable {
            return Err(unreachable_error());
        }
        if let Some((status, message)) = &self.lookup_failure {
            return Ok(Response {
                status: *status,
                body: Err(ErrorDetail::with_message(message.as_str())),
            });
        }

        let records = self
            .records
            .lock()
            .unwrap()
            .get(business_id)
            .map(|found| {
                found
                    .iter()
                    .map(|r| serde_json::to_value(r).unwrap())
                    .collect()
            })
            .unwrap_or_default();
        Ok(Response {
            status: 200,
            body: Ok(RemoteLookupResult { records }),
        })
    }

    async fn create(
        &self,
        app: AppCredentials<'_>,
        record: &DestinationRecord,
    ) -> Result<Response<WriteAck>> {
        self.calls.lock().unwrap().push(Call::Create {
            app_id: app.app_id.to_string(),
            record: record.clone(),
        });
        let response = self.write_response();
        if response.is_success() {
            let id = record
                .get(&self.key_field)
                .and_then(|v| v.value.clone())
                .unwrap_or_default();
            self.records
                .lock()
                .unwrap()
                .entry(id)
                .or_default()
                .push(record.clone());
        }
        Ok(response)
    }

    async fn update(
        &self,
        app: AppCredentials<'_>,
        key: &UpdateKey,
        record: &DestinationRecord,
    ) -> Result<Response<WriteAck>> {
        self.calls.lock().unwrap().push(Call::Update {
            app_id: app.app_id.to_string(),
            key: key.clone(),
            record: record.clone(),
        });
        Ok(self.write_response())
    }
}

/// Serves canned rows per query text; unknown queries fail like a SQL error.
#[derive(Default)]
pub struct FakeSource {
    results: HashMap<String, Vec<SourceRow>>,
    executed: Mutex<Vec<String>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(mut self, query: &str, rows: Vec<SourceRow>) -> Self {
        self.results.insert(query.to_string(), rows);
        self
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceDatabase for FakeSource {
    async fn fetch_rows(&self, query: &str) -> Result<Vec<SourceRow>> {
        self.executed.lock().unwrap().push(query.to_string());
        self.results
            .get(query)
            .cloned()
            .ok_or(SyncError::Sqlx(sqlx::Error::RowNotFound))
    }
}
