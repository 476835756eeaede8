//! Tool-key authentication for the skill endpoints.

use crate::error::ApiError;
use crate::server::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use crisis_common::config::AuthConfig;
use std::sync::Arc;
use tracing::{debug, warn};

/// Header names that carry the key directly (matched case-insensitively)
pub const KEY_HEADERS: &[&str] = &["x-api-key", "api-key", "x-apikey", "apikey"];

pub const MSG_MISSING_KEY: &str = "API key not found in request headers";
pub const MSG_INVALID_KEY: &str = "Invalid API key";

/// Compare two keys without exiting early on the first differing byte
pub fn keys_match(presented: &str, expected: &str) -> bool {
    let (a, b) = (presented.as_bytes(), expected.as_bytes());
    a.len() == b.len() && a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

/// Find the presented key.
///
/// Dedicated headers win. Otherwise `Authorization` is read as
/// `ApiKey <k>`, `Bearer <k>`, or, only when it equals `expected`, a raw key.
/// Blank values count as absent.
pub fn extract_key(headers: &HeaderMap, expected: Option<&str>) -> Option<String> {
    // HeaderMap names are already lower-case
    for name in KEY_HEADERS {
        if let Some(v) = headers.get(*name).and_then(|v| v.to_str().ok()) {
            let v = v.trim();
            if !v.is_empty() {
                return Some(v.to_string());
            }
        }
    }

    let auth = headers.get(header::AUTHORIZATION)?.to_str().ok()?.trim();
    if let Some(k) = auth
        .strip_prefix("ApiKey ")
        .or_else(|| auth.strip_prefix("Bearer "))
    {
        let k = k.trim();
        return (!k.is_empty()).then(|| k.to_string());
    }
    match expected {
        Some(e) if !auth.is_empty() && keys_match(auth, e) => Some(auth.to_string()),
        _ => None,
    }
}

/// Request comes from the orchestration platform, judged by user agent
pub fn is_platform_request(headers: &HeaderMap, auth: &AuthConfig) -> bool {
    let agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    !agent.is_empty()
        && auth
            .platform_user_agents
            .iter()
            .any(|f| !f.is_empty() && agent.contains(&f.to_lowercase()))
}

/// Check a request's headers against the auth config
pub fn check(headers: &HeaderMap, auth: &AuthConfig) -> Result<(), ApiError> {
    if auth.allow_platform_bypass && is_platform_request(headers, auth) {
        debug!("Platform request accepted without key");
        return Ok(());
    }

    let expected = auth.tool_key.as_deref().filter(|k| !k.is_empty());
    let presented = extract_key(headers, expected).ok_or_else(|| {
        warn!("Rejected skill call: no API key");
        ApiError::Unauthorized(MSG_MISSING_KEY.to_string())
    })?;

    match expected {
        Some(e) if keys_match(&presented, e) => Ok(()),
        _ => {
            warn!("Rejected skill call: API key mismatch");
            Err(ApiError::Unauthorized(MSG_INVALID_KEY.to_string()))
        }
    }
}

/// Axum middleware guarding the skill routes
pub async fn require_tool_key(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    check(request.headers(), &state.config.auth)?;
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn auth(key: &str) -> AuthConfig {
        AuthConfig {
            tool_key: Some(key.to_string()),
            ..Default::default()
        }
    }

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut h = HeaderMap::new();
        for (k, v) in pairs {
            h.insert(*k, HeaderValue::from_str(v).unwrap());
        }
        h
    }

    #[test]
    fn test_key_header_variants() {
        for name in ["x-api-key", "api-key", "x-apikey", "apikey"] {
            let h = headers(&[(name, "k1")]);
            assert!(check(&h, &auth("k1")).is_ok(), "header {}", name);
        }
    }

    #[test]
    fn test_authorization_forms() {
        assert!(check(&headers(&[("authorization", "ApiKey k1")]), &auth("k1")).is_ok());
        assert!(check(&headers(&[("authorization", "Bearer k1")]), &auth("k1")).is_ok());
        assert!(check(&headers(&[("authorization", "k1")]), &auth("k1")).is_ok());
    }

    #[test]
    fn test_missing_and_invalid() {
        match check(&HeaderMap::new(), &auth("k1")) {
            Err(ApiError::Unauthorized(m)) => assert_eq!(m, MSG_MISSING_KEY),
            other => panic!("unexpected {:?}", other),
        }
        match check(&headers(&[("x-api-key", "nope")]), &auth("k1")) {
            Err(ApiError::Unauthorized(m)) => assert_eq!(m, MSG_INVALID_KEY),
            other => panic!("unexpected {:?}", other),
        }
        // A raw Authorization value that is not the key is treated as absent
        match check(&headers(&[("authorization", "garbage")]), &auth("k1")) {
            Err(ApiError::Unauthorized(m)) => assert_eq!(m, MSG_MISSING_KEY),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_blank_key_counts_as_missing() {
        for h in [
            headers(&[("x-api-key", "")]),
            headers(&[("x-api-key", "   ")]),
            headers(&[("authorization", "Bearer ")]),
        ] {
            match check(&h, &auth("k1")) {
                Err(ApiError::Unauthorized(m)) => assert_eq!(m, MSG_MISSING_KEY),
                other => panic!("unexpected {:?}", other),
            }
        }
        // A blank dedicated header does not hide a usable Authorization
        let h = headers(&[("x-api-key", ""), ("authorization", "Bearer k1")]);
        assert!(check(&h, &auth("k1")).is_ok());
    }

    #[test]
    fn test_keys_match() {
        assert!(keys_match("k1", "k1"));
        assert!(!keys_match("k1", "k2"));
        assert!(!keys_match("k1", "k10"));
        assert!(!keys_match("", "k1"));
    }

    #[test]
    fn test_no_configured_key_rejects_everything() {
        let h = headers(&[("x-api-key", "anything")]);
        assert!(check(&h, &AuthConfig::default()).is_err());
    }

    #[test]
    fn test_platform_bypass_is_opt_in() {
        let h = headers(&[("user-agent", "IBM watsonx Orchestrate/1.0")]);
        assert!(check(&h, &auth("k1")).is_err());

        let mut config = auth("k1");
        config.allow_platform_bypass = true;
        assert!(check(&h, &config).is_ok());
        assert!(check(&headers(&[("user-agent", "curl/8.0")]), &config).is_err());
    }
}
