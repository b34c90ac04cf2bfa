//! Remote store access.
//!
//! [`RemoteStore`] is the seam between the pipeline and the Notion API:
//! the upload engine and page writer only ever talk to this trait, and
//! [`NotionClient`] is the `reqwest` implementation used by the CLI.
//!
//! # Retry Strategy
//!
//! Every call goes through the same retry loop:
//! - HTTP 429, 500, 502, 503, 504 → retry
//! - other HTTP errors → fail immediately
//! - network errors (including timeouts) → retry, except for page creates
//!   and block appends, which could otherwise be applied twice
//! - backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5), unless the response
//!   carries a `Retry-After` header, which wins
//!
//! Rate limiting is not done here; callers wait on a
//! [`RateLimiter`](crate::ratelimit::RateLimiter) before each call.

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::multipart::{Form, Part};
use serde_json::{json, Value};
use std::time::Duration;

use crate::config::NotionConfig;
use crate::error::TransportError;

pub const NOTION_VERSION: &str = "2022-06-28";

/// Timeout for calls that carry no file data.
pub const CONTROL_TIMEOUT: Duration = Duration::from_secs(30);
/// Timeout for single-request file sends and page writes.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(60);
/// Timeout for one part of a multi-part upload.
pub const PART_TIMEOUT: Duration = Duration::from_secs(120);

/// Body of the "create file upload" call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUpload {
    pub filename: String,
    pub file_size: u64,
    /// Set for multi-part uploads.
    pub number_of_parts: Option<u64>,
}

impl CreateUpload {
    pub fn to_json(&self) -> Value {
        match self.number_of_parts {
            Some(parts) => json!({
                "filename": self.filename,
                "file_size": self.file_size,
                "mode": "multi_part",
                "number_of_parts": parts,
            }),
            None => json!({
                "filename": self.filename,
                "file_size": self.file_size,
            }),
        }
    }
}

/// File content for one "send" call.
#[derive(Debug, Clone)]
pub struct UploadPart {
    pub filename: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
    /// 1-based part number for multi-part uploads.
    pub part_number: Option<u64>,
}

/// Operations the migration needs from the document store.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetch the target database and return its title.
    async fn retrieve_database(&self, database_id: &str) -> Result<String, TransportError>;

    /// Open an upload session and return its id.
    async fn create_upload(&self, request: &CreateUpload) -> Result<String, TransportError>;

    /// Send the file (or one part of it).
    async fn send_upload(&self, upload_id: &str, part: UploadPart) -> Result<(), TransportError>;

    /// Finish a multi-part upload.
    async fn complete_upload(&self, upload_id: &str) -> Result<(), TransportError>;

    /// Create a page in the database and return its id.
    async fn create_page(
        &self,
        database_id: &str,
        properties: &Value,
        children: &[Value],
    ) -> Result<String, TransportError>;

    /// Append blocks to an existing page.
    async fn append_blocks(&self, page_id: &str, children: &[Value]) -> Result<(), TransportError>;
}

/// Notion API client over `reqwest`.
pub struct NotionClient {
    http: reqwest::Client,
    token: String,
    api_base: String,
    max_retries: u32,
}

impl NotionClient {
    pub fn new(config: &NotionConfig, token: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("vmig/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            token,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            max_retries: config.max_retries,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/v1/{}", self.api_base, path)
    }

    fn request(&self, method: reqwest::Method, path: &str, timeout: Duration) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .bearer_auth(&self.token)
            .header("Notion-Version", NOTION_VERSION)
            .timeout(timeout)
    }

    /// Run a request, retrying transient failures.
    ///
    /// `build` is called once per attempt since multipart bodies cannot be
    /// cloned. Non-idempotent calls are not resent after a network error.
    async fn execute<F>(&self, call: Call, build: F) -> Result<Value, TransportError>
    where
        F: Fn() -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut attempt: u32 = 0;
        loop {
            let (err, retry_after) = match build().send().await {
                Ok(response) if response.status().is_success() => {
                    let text = response.text().await?;
                    if text.trim().is_empty() {
                        return Ok(Value::Null);
                    }
                    return serde_json::from_str(&text)
                        .map_err(|e| TransportError::Decode(e.to_string()));
                }
                Ok(response) => {
                    let status = response.status().as_u16();
                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    let body: String = body.chars().take(500).collect();
                    (TransportError::Status { status, body }, retry_after)
                }
                Err(e) => (TransportError::Network(e), None),
            };

            if attempt >= self.max_retries || !err.is_retryable(call.is_idempotent()) {
                return Err(err);
            }

            let delay = retry_after.unwrap_or_else(|| backoff(attempt));
            tracing::debug!(
                "Retrying {:?} after {:?} (attempt {}/{}): {}",
                call,
                delay,
                attempt + 1,
                self.max_retries,
                err
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// API calls, classified by whether sending one twice is harmless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    RetrieveDatabase,
    /// A duplicate only leaves an unused upload session behind.
    CreateUpload,
    SendUpload,
    CompleteUpload,
    CreatePage,
    AppendBlocks,
}

impl Call {
    pub fn is_idempotent(self) -> bool {
        !matches!(self, Call::CreatePage | Call::AppendBlocks)
    }
}

/// Exponential backoff: 1s, 2s, 4s, ... capped at 32s.
fn backoff(attempt: u32) -> Duration {
    Duration::from_secs(1 << attempt.min(5))
}

/// `Retry-After` in its delta-seconds form.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

fn id_field(value: &Value) -> Result<String, TransportError> {
    value
        .get("id")
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| TransportError::Decode("response has no id".to_string()))
}

#[async_trait]
impl RemoteStore for NotionClient {
    async fn retrieve_database(&self, database_id: &str) -> Result<String, TransportError> {
        let path = format!("databases/{}", database_id);
        let value = self
            .execute(Call::RetrieveDatabase, || {
                self.request(reqwest::Method::GET, &path, CONTROL_TIMEOUT)
            })
            .await?;
        Ok(value
            .pointer("/title/0/plain_text")
            .and_then(|v| v.as_str())
            .unwrap_or("(untitled)")
            .to_string())
    }

    async fn create_upload(&self, request: &CreateUpload) -> Result<String, TransportError> {
        let body = request.to_json();
        let value = self
            .execute(Call::CreateUpload, || {
                self.request(reqwest::Method::POST, "file_uploads", CONTROL_TIMEOUT)
                    .json(&body)
            })
            .await?;
        id_field(&value)
    }

    async fn send_upload(&self, upload_id: &str, part: UploadPart) -> Result<(), TransportError> {
        let path = format!("file_uploads/{}/send", upload_id);
        let timeout = if part.part_number.is_some() {
            PART_TIMEOUT
        } else {
            SEND_TIMEOUT
        };
        let mime = part.mime_type.clone();

        self.execute(Call::SendUpload, || {
            let file_part = Part::bytes(part.bytes.clone()).file_name(part.filename.clone());
            let file_part = match file_part.mime_str(&mime) {
                Ok(p) => p,
                Err(_) => Part::bytes(part.bytes.clone()).file_name(part.filename.clone()),
            };
            let mut form = Form::new().part("file", file_part);
            if let Some(n) = part.part_number {
                form = form.text("part_number", n.to_string());
            }
            self.request(reqwest::Method::POST, &path, timeout)
                .multipart(form)
        })
        .await?;
        Ok(())
    }

    async fn complete_upload(&self, upload_id: &str) -> Result<(), TransportError> {
        let path = format!("file_uploads/{}/complete", upload_id);
        self.execute(Call::CompleteUpload, || {
            self.request(reqwest::Method::POST, &path, CONTROL_TIMEOUT)
                .json(&json!({}))
        })
        .await?;
        Ok(())
    }

    async fn create_page(
        &self,
        database_id: &str,
        properties: &Value,
        children: &[Value],
    ) -> Result<String, TransportError> {
        let body = json!({
            "parent": { "database_id": database_id },
            "properties": properties,
            "children": children,
        });
        let value = self
            .execute(Call::CreatePage, || {
                self.request(reqwest::Method::POST, "pages", SEND_TIMEOUT)
                    .json(&body)
            })
            .await?;
        id_field(&value)
    }

    async fn append_blocks(&self, page_id: &str, children: &[Value]) -> Result<(), TransportError> {
        let path = format!("blocks/{}/children", page_id);
        let body = json!({ "children": children });
        self.execute(Call::AppendBlocks, || {
            self.request(reqwest::Method::PATCH, &path, SEND_TIMEOUT)
                .json(&body)
        })
        .await?;
        Ok(())
    }
}
