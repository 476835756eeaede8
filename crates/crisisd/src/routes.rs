//! API routes for crisisd: health, the execution/flow proxy and the push
//! channel. Skill routes live in `skills`.

use crate::error::ApiError;
use crate::server::{AppState, SERVICE_NAME};
use crate::upstream::ExecutionQuery;
use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::Response,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use crisis_common::EventType;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{debug, info};

type AppStateArc = Arc<AppState>;

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/health", get(health))
        .route("/", get(index))
}

async fn health(State(state): State<AppStateArc>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "timestamp": Utc::now().to_rfc3339(),
        "uptime_secs": state.start_time.elapsed().as_secs(),
        "push_channel": state.hub.enabled(),
        "subscribers": state.hub.subscriber_count(),
    }))
}

async fn index() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": SERVICE_NAME,
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "health": "/health",
            "triggerFlow": "/api/trigger-flow",
            "tools": "/api/skills/*",
            "orchestrateCallback": "/api/orchestrate/callback",
            "executions": "/api/executions",
            "flows": "/api/flows",
            "events": "/api/events/stream",
        },
        "timestamp": Utc::now().to_rfc3339(),
        "note": "Tool endpoints require an x-api-key header.",
    }))
}

// ============================================================================
// Execution / Flow Routes
// ============================================================================

pub fn execution_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/executions", get(list_executions))
        .route("/api/executions/:id", get(get_execution))
        .route("/api/flows", get(list_flows))
        .route("/api/flows/:id", get(get_flow))
        .route("/api/trigger-flow", post(trigger_flow))
}

/// Platform executions when configured, ingested ones otherwise
async fn list_executions(
    State(state): State<AppStateArc>,
    Query(query): Query<ExecutionQuery>,
) -> Result<Json<Value>, ApiError> {
    if !state.upstream.is_configured() {
        debug!("Serving executions from ingest store");
        return Ok(Json(state.ingest.executions_payload(&query).await));
    }
    state
        .upstream
        .list_executions(&query)
        .await
        .map(Json)
        .map_err(ApiError::upstream("failed to fetch executions"))
}

async fn get_execution(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    if !state.upstream.is_configured() {
        return state
            .ingest
            .get_execution(&id)
            .await
            .map(Json)
            .ok_or_else(|| ApiError::NotFound(format!("execution '{}' not found", id)));
    }
    state
        .upstream
        .get_execution(&id)
        .await
        .map(Json)
        .map_err(ApiError::upstream("failed to fetch execution"))
}

async fn list_flows(State(state): State<AppStateArc>) -> Result<Json<Value>, ApiError> {
    state
        .upstream
        .list_flows()
        .await
        .map(Json)
        .map_err(ApiError::upstream("failed to fetch flows"))
}

async fn get_flow(
    State(state): State<AppStateArc>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state
        .upstream
        .get_flow(&id)
        .await
        .map(Json)
        .map_err(ApiError::upstream("failed to fetch flow"))
}

async fn trigger_flow(
    State(state): State<AppStateArc>,
    Json(input): Json<Value>,
) -> Result<Json<Value>, ApiError> {
    state
        .upstream
        .run_flow(input)
        .await
        .map(Json)
        .map_err(ApiError::upstream("flow trigger failed"))
}

// ============================================================================
// Push Channel Routes
// ============================================================================

pub fn event_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/api/events/stream", get(event_stream))
        .route("/api/orchestrate/callback", post(orchestrate_callback))
}

async fn event_stream(State(state): State<AppStateArc>) -> Result<Response, ApiError> {
    state.hub.stream_response()
}

/// Step updates from the platform. Unauthenticated; any body is accepted.
async fn orchestrate_callback(
    State(state): State<AppStateArc>,
    body: Bytes,
) -> (StatusCode, &'static str) {
    let mut data = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Object(obj)) => obj,
        Ok(other) => Map::from_iter([("body".to_string(), other)]),
        Err(_) if body.is_empty() => Map::new(),
        Err(_) => Map::from_iter([(
            "body".to_string(),
            Value::String(String::from_utf8_lossy(&body).into_owned()),
        )]),
    };
    data.insert("timestamp".to_string(), json!(Utc::now().to_rfc3339()));

    info!("[Orchestrate Callback] {} fields", data.len());
    state.hub.emit(EventType::FlowUpdate, Value::Object(data));
    (StatusCode::OK, "ok")
}
