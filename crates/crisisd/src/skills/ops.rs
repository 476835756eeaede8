//! NotifyOps and HumanApproval stubs. Both surface as push events.

use crate::hub::EventHub;
use crate::server::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use crisis_common::EventType;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub const OPS_CHANNELS: [&str; 2] = ["slack", "pagerduty"];

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NotifyOpsRequest {
    pub priority: Option<String>,
    pub incident_id: Option<String>,
    pub summary: Option<String>,
    pub links: Option<Value>,
}

pub fn notify(hub: &EventHub, req: NotifyOpsRequest) -> Value {
    let timestamp = Utc::now().to_rfc3339();
    info!(
        "[NotifyOps] Priority: {}, Incident: {}",
        req.priority.as_deref().unwrap_or("-"),
        req.incident_id.as_deref().unwrap_or("-")
    );
    hub.emit(
        EventType::OpsNotification,
        json!({
            "priority": req.priority,
            "incident_id": req.incident_id,
            "summary": req.summary,
            "links": req.links,
            "timestamp": timestamp,
        }),
    );
    json!({
        "notified": true,
        "channels": OPS_CHANNELS,
        "timestamp": timestamp,
    })
}

pub async fn notify_ops(
    State(state): State<Arc<AppState>>,
    Json(req): Json<NotifyOpsRequest>,
) -> Json<Value> {
    Json(notify(&state.hub, req))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct HumanApprovalRequest {
    pub flow_run_id: Option<String>,
    pub decision: Option<String>,
    pub comments: Option<String>,
}

pub fn approve(hub: &EventHub, req: HumanApprovalRequest) -> Value {
    info!(
        "[HumanApproval] Flow: {}, Decision: {}",
        req.flow_run_id.as_deref().unwrap_or("-"),
        req.decision.as_deref().unwrap_or("-")
    );
    hub.emit(
        EventType::HumanApproval,
        json!({
            "flow_run_id": req.flow_run_id,
            "decision": req.decision,
            "comments": req.comments,
            "timestamp": Utc::now().to_rfc3339(),
        }),
    );
    json!({
        "status": "received",
        "flow_run_id": req.flow_run_id,
        "decision": req.decision,
    })
}

pub async fn human_approval(
    State(state): State<Arc<AppState>>,
    Json(req): Json<HumanApprovalRequest>,
) -> Json<Value> {
    Json(approve(&state.hub, req))
}
