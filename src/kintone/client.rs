// kintonesync/src/kintone/client.rs
use async_trait::async_trait;
use reqwest::RequestBuilder;
use serde::Serialize;
use url::Url;

use super::{
    AppCredentials, ErrorDetail, RecordStore, RemoteLookupResult, Response, STATUS_OK, UpdateKey,
    WriteAck,
};
use crate::config::KintoneSettings;
use crate::errors::Result;
use crate::record::DestinationRecord;

const API_TOKEN_HEADER: &str = "X-Cybozu-API-Token";
const RECORDS_PATH: &str = "k/v1/records.json";
const RECORD_PATH: &str = "k/v1/record.json";

#[derive(Serialize)]
struct CreateBody<'a> {
    app: &'a str,
    record: &'a DestinationRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody<'a> {
    app: &'a str,
    update_key: &'a UpdateKey,
    record: &'a DestinationRecord,
}

/// Kintone REST client. Every request is bounded by the configured timeout.
pub struct KintoneClient {
    http: reqwest::Client,
    base_url: Url,
}

impl KintoneClient {
    pub fn new(settings: &KintoneSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: settings.base_url.clone(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    /// Sends the request and returns the status with the raw body.
    async fn execute(&self, request: RequestBuilder) -> Result<(u16, Vec<u8>)> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;
        Ok((status, body.to_vec()))
    }
}

/// Quotes `value` as a Kintone query string literal.
fn query_literal(value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("\"{}\"", escaped)
}

fn error_detail(status: u16, body: &[u8]) -> ErrorDetail {
    serde_json::from_slice::<ErrorDetail>(body).unwrap_or_else(|_| {
        tracing::debug!("Kintone error body (HTTP {}) is not JSON", status);
        ErrorDetail::default()
    })
}

fn write_response(status: u16, body: &[u8]) -> Response<WriteAck> {
    if status != STATUS_OK {
        return Response {
            status,
            body: Err(error_detail(status, body)),
        };
    }
    // A 200 is a completed write even if the acknowledgement is unreadable.
    let ack = serde_json::from_slice::<WriteAck>(body).unwrap_or_default();
    tracing::debug!(id = ?ack.id, revision = ?ack.revision, "Kintone write acknowledged");
    Response { status, body: Ok(ack) }
}

#[async_trait]
impl RecordStore for KintoneClient {
    async fn lookup(
        &self,
        app: AppCredentials<'_>,
        key_field: &str,
        business_id: &str,
    ) -> Result<Response<RemoteLookupResult>> {
        let query = format!("{} = {}", key_field, query_literal(business_id));
        let request = self
            .http
            .get(self.endpoint(RECORDS_PATH)?)
            .header(API_TOKEN_HEADER, app.api_token)
            .query(&[("app", app.app_id), ("query", query.as_str())]);

        let (status, body) = self.execute(request).await?;
        if status != STATUS_OK {
            return Ok(Response {
                status,
                body: Err(error_detail(status, &body)),
            });
        }

        let parsed = serde_json::from_slice::<RemoteLookupResult>(&body).map_err(|e| {
            ErrorDetail::with_message(format!("Unexpected lookup response from Kintone: {}", e))
        });
        Ok(Response {
            status,
            body: parsed,
        })
    }

    async fn create(
        &self,
        app: AppCredentials<'_>,
        record: &DestinationRecord,
    ) -> Result<Response<WriteAck>> {
        let request = self
            .http
            .post(self.endpoint(RECORD_PATH)?)
            .header(API_TOKEN_HEADER, app.api_token)
            .json(&CreateBody {
                app: app.app_id,
                record,
            });

        let (status, body) = self.execute(request).await?;
        Ok(write_response(status, &body))
    }

    async fn update(
        &self,
        app: AppCredentials<'_>,
        key: &UpdateKey,
        record: &DestinationRecord,
    ) -> Result<Response<WriteAck>> {
        let request = self
            .http
            .put(self.endpoint(RECORD_PATH)?)
            .header(API_TOKEN_HEADER, app.api_token)
            .json(&UpdateBody {
                app: app.app_id,
                update_key: key,
                record,
            });

        let (status, body) = self.execute(request).await?;
        Ok(write_response(status, &body))
    }
}
