//! IngestEvent: store an incoming event and announce it as `newEvent`.

use super::short_id;
use crate::ingest::StoredEvent;
use crate::server::AppState;
use axum::{extract::State, Json};
use chrono::Utc;
use crisis_common::EventType;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

pub async fn ingest_event(
    State(state): State<Arc<AppState>>,
    Json(event): Json<Value>,
) -> Json<Value> {
    let stored = StoredEvent {
        event_id: short_id("EVT"),
        event,
        timestamp: Utc::now(),
    };
    let event_id = stored.event_id.clone();
    let timestamp = stored.timestamp.to_rfc3339();

    state.hub.emit(
        EventType::NewEvent,
        json!({
            "eventId": event_id,
            "event": stored.event,
            "timestamp": timestamp,
        }),
    );
    state.ingest.insert(stored).await;
    info!("[IngestEvent] Stored event: {}", event_id);

    Json(json!({
        "stored": true,
        "eventId": event_id,
        "timestamp": timestamp,
    }))
}
