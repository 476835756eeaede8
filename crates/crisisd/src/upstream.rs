//! Orchestration platform client: IAM token exchange plus the execution and
//! flow endpoints the dashboard reads through this backend.

use crate::error::UpstreamError;
use crisis_common::config::UpstreamConfig;
use crisis_common::execution::DEFAULT_PAGE_SIZE;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

const IAM_GRANT_TYPE: &str = "urn:ibm:params:oauth:grant-type:apikey";

/// Refresh the token this long before the platform says it expires
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// `GET /api/executions` query string
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutionQuery {
    pub limit: Option<usize>,
    pub offset: Option<usize>,
    pub status: Option<String>,
    #[serde(rename = "flowId")]
    pub flow_id: Option<String>,
}

impl ExecutionQuery {
    pub fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }

    /// Platform query parameters; the platform spells the flow filter `flow_id`
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("limit", self.limit().to_string()),
            ("offset", self.offset().to_string()),
        ];
        if let Some(status) = self.status.as_ref().filter(|s| !s.is_empty()) {
            params.push(("status", status.clone()));
        }
        if let Some(flow) = self.flow_id.as_ref().filter(|s| !s.is_empty()) {
            params.push(("flow_id", flow.clone()));
        }
        params
    }
}

#[derive(Debug, Deserialize)]
struct IamTokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

struct CachedToken {
    token: String,
    refresh_at: Instant,
}

pub struct OrchestrateClient {
    http: reqwest::Client,
    config: UpstreamConfig,
    token: RwLock<Option<CachedToken>>,
}

impl OrchestrateClient {
    pub fn new(config: UpstreamConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;
        Ok(Self {
            http,
            config,
            token: RwLock::new(None),
        })
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Bearer token, exchanged from the API key and cached until near expiry
    async fn bearer(&self) -> Result<String, UpstreamError> {
        {
            let cached = self.token.read().await;
            if let Some(t) = cached.as_ref().filter(|t| Instant::now() < t.refresh_at) {
                return Ok(t.token.clone());
            }
        }

        let api_key = self
            .config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(UpstreamError::NotConfigured)?;

        debug!("Exchanging API key for IAM token");
        let resp = self
            .http
            .post(&self.config.iam_url)
            .form(&[("grant_type", IAM_GRANT_TYPE), ("apikey", api_key)])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            warn!("IAM token error: {} {}", status, body);
            return Err(UpstreamError::Token(format!("{}: {}", status, body)));
        }

        let parsed: IamTokenResponse = resp
            .json()
            .await
            .map_err(|e| UpstreamError::Token(e.to_string()))?;

        let lifetime = Duration::from_secs(parsed.expires_in.unwrap_or(3600));
        let refresh_at = Instant::now() + lifetime.saturating_sub(TOKEN_REFRESH_MARGIN);
        let token = parsed.access_token;
        *self.token.write().await = Some(CachedToken {
            token: token.clone(),
            refresh_at,
        });
        info!("IAM token refreshed, valid for {}s", lifetime.as_secs());
        Ok(token)
    }

    async fn read_json(resp: reqwest::Response) -> Result<Value, UpstreamError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(UpstreamError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json().await?)
    }

    async fn get(&self, path: &str, params: &[(&str, String)]) -> Result<Value, UpstreamError> {
        let token = self.bearer().await?;
        let resp = self
            .http
            .get(self.url(path))
            .bearer_auth(token)
            .query(params)
            .send()
            .await?;
        Self::read_json(resp).await
    }

    pub async fn list_executions(&self, query: &ExecutionQuery) -> Result<Value, UpstreamError> {
        self.get("executions", &query.to_params()).await
    }

    pub async fn get_execution(&self, id: &str) -> Result<Value, UpstreamError> {
        self.get(&format!("executions/{}", id), &[]).await
    }

    pub async fn list_flows(&self) -> Result<Value, UpstreamError> {
        self.get("flows", &[]).await
    }

    pub async fn get_flow(&self, id: &str) -> Result<Value, UpstreamError> {
        self.get(&format!("flows/{}", id), &[]).await
    }

    /// Start the configured flow with `input` as its input
    pub async fn run_flow(&self, input: Value) -> Result<Value, UpstreamError> {
        let flow_id = self
            .config
            .flow_id
            .as_deref()
            .filter(|f| !f.is_empty())
            .ok_or(UpstreamError::MissingFlowId)?;
        let token = self.bearer().await?;

        info!("Triggering flow {}", flow_id);
        let resp = self
            .http
            .post(self.url(&format!("flows/{}/run", flow_id)))
            .bearer_auth(token)
            .json(&json!({ "input": input }))
            .send()
            .await?;
        Self::read_json(resp).await
    }
}
