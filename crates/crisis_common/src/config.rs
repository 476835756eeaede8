//! Configuration for crisisd and crisisctl.
//!
//! Loads settings from `$CRISIS_CONFIG` or /etc/crisis/config.toml, falls back
//! to defaults, then applies environment overrides.

use crate::error::{CrisisError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Config file path
pub const CONFIG_PATH: &str = "/etc/crisis/config.toml";

/// Env var naming an alternative config file
pub const CONFIG_ENV: &str = "CRISIS_CONFIG";

/// Backend HTTP server settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Serve `/api/events/stream`. Serverless deployments turn this off.
    #[serde(default = "default_true")]
    pub push_channel: bool,

    /// Buffered messages per push subscriber before lagging ones drop
    #[serde(default = "default_push_buffer")]
    pub push_buffer: usize,

    /// Maximum request body in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit_bytes: usize,

    /// Ingested events kept in memory
    #[serde(default = "default_ingest_capacity")]
    pub ingest_capacity: usize,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_true() -> bool {
    true
}

fn default_push_buffer() -> usize {
    256
}

fn default_body_limit() -> usize {
    1024 * 1024
}

fn default_ingest_capacity() -> usize {
    500
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            push_channel: default_true(),
            push_buffer: default_push_buffer(),
            body_limit_bytes: default_body_limit(),
            ingest_capacity: default_ingest_capacity(),
        }
    }
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}

/// Skill endpoint authentication
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Shared tool key. When unset every skill request is rejected.
    #[serde(default)]
    pub tool_key: Option<String>,

    /// Let requests from the orchestration platform through without a key
    #[serde(default)]
    pub allow_platform_bypass: bool,

    /// Lower-case user-agent fragments that identify the platform
    #[serde(default = "default_platform_agents")]
    pub platform_user_agents: Vec<String>,
}

fn default_platform_agents() -> Vec<String> {
    vec!["watsonx".to_string(), "orchestrate".to_string()]
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            tool_key: None,
            allow_platform_bypass: false,
            platform_user_agents: default_platform_agents(),
        }
    }
}

/// Orchestration platform the backend proxies to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_iam_url")]
    pub iam_url: String,

    #[serde(default = "default_platform_url")]
    pub base_url: String,

    /// IAM API key. Without it the backend serves ingested executions instead.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Flow started by `/api/trigger-flow`
    #[serde(default)]
    pub flow_id: Option<String>,

    #[serde(default = "default_upstream_timeout")]
    pub timeout_secs: u64,
}

fn default_iam_url() -> String {
    "https://iam.cloud.ibm.com/identity/token".to_string()
}

fn default_platform_url() -> String {
    "https://api.ibm.com/watsonx/orchestrate".to_string()
}

fn default_upstream_timeout() -> u64 {
    15
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            iam_url: default_iam_url(),
            base_url: default_platform_url(),
            api_key: None,
            flow_id: None,
            timeout_secs: default_upstream_timeout(),
        }
    }
}

impl UpstreamConfig {
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Dashboard client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,

    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Push channel connect timeout
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Push channel reconnects per session
    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,

    /// In-app banner lifetime
    #[serde(default = "default_banner_ttl")]
    pub banner_ttl_secs: u64,

    /// Desktop notifications for new crises
    #[serde(default = "default_true")]
    pub system_alerts: bool,
}

fn default_backend_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_poll_interval() -> u64 {
    5
}

fn default_page_size() -> usize {
    crate::execution::DEFAULT_PAGE_SIZE
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_reconnect_attempts() -> u32 {
    3
}

fn default_reconnect_delay() -> u64 {
    1000
}

fn default_banner_ttl() -> u64 {
    5
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            poll_interval_secs: default_poll_interval(),
            page_size: default_page_size(),
            connect_timeout_secs: default_connect_timeout(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_delay_ms: default_reconnect_delay(),
            banner_ttl_secs: default_banner_ttl(),
            system_alerts: default_true(),
        }
    }
}

impl DashboardConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn banner_ttl(&self) -> Duration {
        Duration::from_secs(self.banner_ttl_secs)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrisisConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub dashboard: DashboardConfig,
}

impl CrisisConfig {
    /// Load config from file (or defaults), then apply environment overrides
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| CONFIG_PATH.to_string());
        let mut config = Self::load_from_path(&path).unwrap_or_else(|e| {
            warn!("Config not loaded from {}, using defaults: {}", path, e);
            CrisisConfig::default()
        });
        config.apply_env(|k| std::env::var(k).ok());
        config
    }

    /// Load config from a specific path
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: CrisisConfig = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Overlay environment variables. `lookup` is `std::env::var` outside tests.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |k: &str| lookup(k).filter(|v| !v.trim().is_empty());

        if let Some(port) = get("PORT") {
            match port.trim().parse() {
                Ok(p) => self.server.port = p,
                Err(_) => warn!("Ignoring invalid PORT value: {}", port),
            }
        }
        if let Some(key) = get("ORCHESTRATE_TOOL_KEY") {
            self.auth.tool_key = Some(key);
        }
        if let Some(key) = get("IBM_APIKEY") {
            self.upstream.api_key = Some(key);
        }
        if let Some(flow) = get("ORCHESTRATE_FLOW_ID") {
            self.upstream.flow_id = Some(flow);
        }
        if let Some(url) = get("ORCHESTRATE_BASE_URL") {
            self.upstream.base_url = url;
        }
        if let Some(url) = get("CRISIS_BACKEND_URL") {
            self.dashboard.backend_url = url;
        }
    }

    /// Reject settings that cannot work at all
    pub fn validate(&self) -> Result<()> {
        if self.dashboard.page_size == 0 {
            return Err(CrisisError::Config("dashboard.page_size must be > 0".into()));
        }
        if self.server.ingest_capacity == 0 {
            return Err(CrisisError::Config("server.ingest_capacity must be > 0".into()));
        }
        if self.server.push_buffer == 0 {
            return Err(CrisisError::Config("server.push_buffer must be > 0".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = CrisisConfig::default();
        assert_eq!(config.server.port, 8080);
        assert!(config.server.push_channel);
        assert!(!config.auth.allow_platform_bypass);
        assert_eq!(config.dashboard.poll_interval(), Duration::from_secs(5));
        assert_eq!(config.dashboard.page_size, 50);
        assert_eq!(config.dashboard.reconnect_attempts, 3);
        assert!(!config.upstream.is_configured());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_partial() {
        let toml_str = r#"
[server]
port = 9090
push_channel = false

[dashboard]
banner_ttl_secs = 2
"#;
        let config: CrisisConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.port, 9090);
        assert!(!config.server.push_channel);
        assert_eq!(config.dashboard.banner_ttl_secs, 2);
        // Defaults for missing fields
        assert_eq!(config.server.bind, "0.0.0.0");
        assert_eq!(config.dashboard.poll_interval_secs, 5);
    }

    #[test]
    fn test_load_from_path() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[auth]\ntool_key = \"secret\"\nallow_platform_bypass = true").unwrap();

        let config = CrisisConfig::load_from_path(file.path()).unwrap();
        assert_eq!(config.auth.tool_key.as_deref(), Some("secret"));
        assert!(config.auth.allow_platform_bypass);
    }

    #[test]
    fn test_load_from_path_bad_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nport = ").unwrap();

        let err = CrisisConfig::load_from_path(file.path()).unwrap_err();
        assert_eq!(err.kind(), "toml");
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PORT", "3001"),
            ("ORCHESTRATE_TOOL_KEY", "tool-key"),
            ("IBM_APIKEY", "iam-key"),
            ("CRISIS_BACKEND_URL", "http://backend:3001"),
            ("ORCHESTRATE_FLOW_ID", ""),
        ]
        .into_iter()
        .collect();

        let mut config = CrisisConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(config.server.port, 3001);
        assert_eq!(config.auth.tool_key.as_deref(), Some("tool-key"));
        assert!(config.upstream.is_configured());
        assert_eq!(config.dashboard.backend_url, "http://backend:3001");
        // Empty values are ignored
        assert!(config.upstream.flow_id.is_none());
    }

    #[test]
    fn test_invalid_port_env_ignored() {
        let mut config = CrisisConfig::default();
        config.apply_env(|k| (k == "PORT").then(|| "eighty".to_string()));
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_validate_rejects_zero_page() {
        let mut config = CrisisConfig::default();
        config.dashboard.page_size = 0;
        assert!(matches!(config.validate(), Err(CrisisError::Config(_))));
    }
}
