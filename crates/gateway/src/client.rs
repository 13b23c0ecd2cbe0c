//! Record API client for the hosted platform.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use formlink_core::{AppId, FieldMap, RecordGateway, RecordId, Result, SyncError};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_LOG_BODY_CHARS: usize = 512;

/// Which side of the error taxonomy a failed call falls on.
#[derive(Debug, Clone, Copy)]
enum ErrorKind {
    Read,
    Write,
}

fn remote_error(kind: ErrorKind, status: Option<u16>, message: String) -> SyncError {
    match (kind, status) {
        (ErrorKind::Read, Some(status)) => SyncError::remote_read_status(status, message),
        (ErrorKind::Read, None) => SyncError::remote_read(message),
        (ErrorKind::Write, Some(status)) => SyncError::remote_write_status(status, message),
        (ErrorKind::Write, None) => SyncError::remote_write(message),
    }
}

fn transport_error(kind: ErrorKind, err: reqwest::Error) -> SyncError {
    let status = err.status().map(|s| s.as_u16());
    remote_error(kind, status, format!("HTTP error: {}", err))
}

/// Structured error body the platform returns alongside non-2xx statuses.
#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    code: String,
    message: String,
}

#[derive(Debug, Serialize)]
struct CreateRecordBody<'a> {
    app: u64,
    record: &'a FieldMap,
}

#[derive(Debug, Deserialize)]
struct CreateRecordResponse {
    id: String,
}

#[derive(Debug, Serialize)]
struct UpdateRecordBody<'a> {
    app: u64,
    id: i64,
    record: &'a FieldMap,
}

#[derive(Debug, Deserialize)]
struct GetRecordResponse {
    record: FieldMap,
}

#[derive(Debug, Deserialize)]
struct QueryRecordsResponse {
    records: Vec<FieldMap>,
}

/// Client for the platform's record CRUD API.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    client: reqwest::Client,
    base_url: String,
    auth: HeaderValue,
}

impl PlatformClient {
    /// Create a new record API client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the platform API (e.g., "https://example.cloud/k/v1")
    /// * `api_token` - API token authorized for both the payment and purchaser apps
    pub fn new(base_url: &str, api_token: &str) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("Failed to build HTTP client");
        let auth = HeaderValue::from_str(&format!("Bearer {}", api_token))
            .expect("API token contains invalid header characters");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        }
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, self.auth.clone());
        headers
    }

    fn log_response(status: reqwest::StatusCode, body: &str) {
        if status.is_success() {
            debug!("API response status: {}", status);
            return;
        }

        let mut preview = body.chars().take(MAX_LOG_BODY_CHARS).collect::<String>();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        debug!("API response error ({}): {}", status, preview);
    }

    /// Parse a JSON response body, decoding structured error bodies into the
    /// sync error taxonomy.
    async fn parse_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
        kind: ErrorKind,
    ) -> Result<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| transport_error(kind, err))?;
        Self::log_response(status, &body);

        if !status.is_success() {
            if let Ok(error) = serde_json::from_str::<ApiErrorResponse>(&body) {
                return Err(remote_error(
                    kind,
                    Some(status.as_u16()),
                    format!("{}: {}", error.code, error.message),
                ));
            }
            return Err(remote_error(
                kind,
                Some(status.as_u16()),
                format!("Request failed: {}", body),
            ));
        }

        serde_json::from_str(&body).map_err(|e| {
            log::error!(
                "Failed to deserialize response. Body: {}, Error: {}",
                body,
                e
            );
            remote_error(
                kind,
                Some(status.as_u16()),
                format!("Failed to parse response: {}", e),
            )
        })
    }
}

#[async_trait]
impl RecordGateway for PlatformClient {
    /// Create a record.
    ///
    /// POST /record
    async fn create(&self, app: AppId, record: &FieldMap) -> Result<RecordId> {
        let url = format!("{}/record", self.base_url);
        debug!("[Gateway] create record in app {}", app);

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(&CreateRecordBody { app: app.0, record })
            .send()
            .await
            .map_err(|err| transport_error(ErrorKind::Write, err))?;

        let parsed: CreateRecordResponse = Self::parse_response(response, ErrorKind::Write).await?;
        parsed
            .id
            .trim()
            .parse::<i64>()
            .map(RecordId)
            .map_err(|_| {
                SyncError::remote_write(format!(
                    "malformed record id in create response: {}",
                    parsed.id
                ))
            })
    }

    /// Partially update a record. Flat fields not present in `record` keep
    /// their remote values; a table field replaces the full row set.
    ///
    /// PUT /record
    async fn update(&self, app: AppId, id: RecordId, record: &FieldMap) -> Result<()> {
        let url = format!("{}/record", self.base_url);
        debug!("[Gateway] update record {} in app {}", id, app);

        let response = self
            .client
            .put(&url)
            .headers(self.headers())
            .json(&UpdateRecordBody {
                app: app.0,
                id: id.0,
                record,
            })
            .send()
            .await
            .map_err(|err| transport_error(ErrorKind::Write, err))?;

        Self::parse_response::<serde_json::Value>(response, ErrorKind::Write).await?;
        Ok(())
    }

    /// Fetch a record by identifier.
    ///
    /// GET /record?app={app}&id={id}
    async fn get(&self, app: AppId, id: RecordId) -> Result<FieldMap> {
        let url = format!("{}/record", self.base_url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .query(&[("app", app.0.to_string()), ("id", id.0.to_string())])
            .send()
            .await
            .map_err(|err| transport_error(ErrorKind::Read, err))?;

        let parsed: GetRecordResponse = Self::parse_response(response, ErrorKind::Read).await?;
        Ok(parsed.record)
    }

    /// Query records by filter expression.
    ///
    /// GET /records?app={app}&query={filter}&fields[k]={field}
    async fn query(
        &self,
        app: AppId,
        filter: &str,
        fields: Option<&[String]>,
    ) -> Result<Vec<FieldMap>> {
        let url = format!("{}/records", self.base_url);
        debug!("[Gateway] query app {} with filter {}", app, filter);

        let mut params: Vec<(String, String)> = vec![
            ("app".to_string(), app.0.to_string()),
            ("query".to_string(), filter.to_string()),
        ];
        if let Some(fields) = fields {
            for (index, field) in fields.iter().enumerate() {
                params.push((format!("fields[{}]", index), field.clone()));
            }
        }

        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .query(&params)
            .send()
            .await
            .map_err(|err| transport_error(ErrorKind::Read, err))?;

        let parsed: QueryRecordsResponse = Self::parse_response(response, ErrorKind::Read).await?;
        Ok(parsed.records)
    }
}
