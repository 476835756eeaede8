//! HTTP server for crisisd

use crate::error::UpstreamError;
use crate::hub::EventHub;
use crate::ingest::IngestStore;
use crate::routes;
use crate::skills;
use crate::upstream::OrchestrateClient;
use anyhow::{Context, Result};
use axum::Router;
use crisis_common::CrisisConfig;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

pub const SERVICE_NAME: &str = "Crisis Monitor Backend";

/// Application state shared across handlers
pub struct AppState {
    pub config: CrisisConfig,
    pub hub: EventHub,
    pub ingest: IngestStore,
    pub upstream: OrchestrateClient,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: CrisisConfig) -> Result<Self, UpstreamError> {
        let hub = EventHub::new(config.server.push_buffer, config.server.push_channel);
        let ingest = IngestStore::new(config.server.ingest_capacity);
        let upstream = OrchestrateClient::new(config.upstream.clone())?;
        Ok(Self {
            config,
            hub,
            ingest,
            upstream,
            start_time: Instant::now(),
        })
    }
}

/// Full router with all layers applied
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        .merge(routes::health_routes())
        .merge(routes::execution_routes())
        .merge(routes::event_routes())
        .merge(skills::skill_routes(state.clone()))
        .with_state(state)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Run the HTTP server until `shutdown` resolves
pub async fn run<F>(state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = state.config.server.listen_addr();
    let push = state.config.server.push_channel;
    let upstream = state.upstream.is_configured();
    let app = build_router(Arc::new(state));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!("  Listening on http://{}", addr);
    info!(
        "  Push channel: {}, platform proxy: {}",
        if push { "enabled" } else { "disabled" },
        if upstream { "configured" } else { "ingest only" }
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}
