//! HTTP-facing errors for crisisd.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Failures talking to the orchestration platform
#[derive(Error, Debug)]
pub enum UpstreamError {
    #[error("Orchestration platform not configured (IBM_APIKEY unset)")]
    NotConfigured,

    #[error("No flow id configured (ORCHESTRATE_FLOW_ID unset)")]
    MissingFlowId,

    #[error("IAM token exchange failed: {0}")]
    Token(String),

    #[error("Platform returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Push channel switched off in config
    #[error("push channel disabled")]
    ChannelDisabled,

    /// `context` is the short error label, e.g. "failed to fetch executions"
    #[error("{context}: {source}")]
    Upstream {
        context: &'static str,
        #[source]
        source: UpstreamError,
    },
}

impl ApiError {
    pub fn upstream(context: &'static str) -> impl FnOnce(UpstreamError) -> ApiError {
        move |source| ApiError::Upstream { context, source }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::ChannelDisabled => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Upstream { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = match &self {
            ApiError::Unauthorized(message) => json!({
                "error": "unauthorized",
                "message": message,
            }),
            ApiError::BadRequest(message) => json!({
                "error": "bad request",
                "message": message,
            }),
            ApiError::NotFound(message) => json!({
                "error": "not found",
                "message": message,
            }),
            ApiError::ChannelDisabled => json!({
                "error": "unavailable",
                "message": "push channel disabled on this backend",
            }),
            ApiError::Upstream { context, source } => json!({
                "error": context,
                "details": source.to_string(),
            }),
        };
        (self.status(), Json(body)).into_response()
    }
}
