//! HTTP client for the crisisd backend.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Per-request timeout for plain (non-streaming) calls
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    Decode(String),

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl ClientError {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Source of the authoritative execution list
#[async_trait]
pub trait ExecutionFetcher: Send + Sync {
    /// Raw execution payload, in whatever shape the backend returns it
    async fn fetch_executions(&self, limit: usize) -> Result<Value, ClientError>;
}

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    /// `connect_timeout` bounds TCP connect only; streaming calls have no
    /// overall timeout
    pub fn new(base_url: &str, connect_timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json(resp: reqwest::Response) -> Result<Value, ClientError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }
        resp.json()
            .await
            .map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, ClientError> {
        debug!("GET {}", path);
        let resp = self
            .http
            .get(self.url(path))
            .query(query)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        Self::read_json(resp).await
    }

    pub async fn health(&self) -> Result<Value, ClientError> {
        self.get_json("/health", &[]).await
    }

    pub async fn executions(&self, limit: usize) -> Result<Value, ClientError> {
        self.get_json("/api/executions", &[("limit", limit.to_string())])
            .await
    }

    /// Start the configured flow with a crisis message as input
    pub async fn trigger_flow(&self, text: &str, channel: &str) -> Result<Value, ClientError> {
        let resp = self
            .http
            .post(self.url("/api/trigger-flow"))
            .json(&json!({ "text": text, "channel": channel }))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        Self::read_json(resp).await
    }

    /// Open the push channel. Returns the live response; the caller reads
    /// its body as newline-delimited JSON.
    pub async fn open_event_stream(&self) -> Result<reqwest::Response, ClientError> {
        let resp = self
            .http
            .get(self.url("/api/events/stream"))
            .header(reqwest::header::ACCEPT, "application/x-ndjson")
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl ExecutionFetcher for ApiClient {
    async fn fetch_executions(&self, limit: usize) -> Result<Value, ClientError> {
        self.executions(limit).await
    }
}
