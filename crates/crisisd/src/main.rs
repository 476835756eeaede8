//! crisisd - crisis monitor backend
//!
//! Serves the skill stubs, proxies the orchestration platform and fans out
//! live events to dashboards.

use anyhow::{Context, Result};
use crisis_common::CrisisConfig;
use crisisd::server::{self, AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("crisisd v{} starting", env!("CARGO_PKG_VERSION"));

    let config = CrisisConfig::load();
    config.validate().context("invalid configuration")?;
    if config.auth.tool_key.is_none() {
        warn!("ORCHESTRATE_TOOL_KEY not set, skill endpoints will reject every call");
    }
    if config.auth.allow_platform_bypass {
        warn!("Platform user-agent bypass is enabled");
    }

    let state = AppState::new(config).context("failed to build HTTP client")?;

    server::run(state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Shutting down gracefully");
    })
    .await
}
