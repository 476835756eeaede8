//! Bounded in-memory store for ingested events.
//!
//! When no orchestration platform is configured, execution-shaped events
//! posted to the ingest skill double as the `/api/executions` source.

use crate::upstream::ExecutionQuery;
use chrono::{DateTime, Utc};
use crisis_common::ExecutionStatus;
use lru::LruCache;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::num::NonZeroUsize;
use tokio::sync::Mutex;

/// Keys whose presence marks an ingested event as an execution record
const EXECUTION_KEYS: &[&str] = &["status", "flow_name", "flowName", "execution_id"];

/// Keys an execution id may arrive under
const ID_KEYS: &[&str] = &["id", "execution_id", "executionId"];

fn execution_id(exec: &Value) -> Option<&str> {
    ID_KEYS
        .iter()
        .find_map(|k| exec.get(*k).and_then(Value::as_str))
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredEvent {
    #[serde(rename = "eventId")]
    pub event_id: String,
    pub event: Value,
    pub timestamp: DateTime<Utc>,
}

impl StoredEvent {
    pub fn is_execution(&self) -> bool {
        self.event
            .as_object()
            .map(|o| EXECUTION_KEYS.iter().any(|k| o.contains_key(*k)))
            .unwrap_or(false)
    }

    /// Execution record view, filling `id` and `created_at` when missing
    fn as_execution(&self) -> Option<Value> {
        if !self.is_execution() {
            return None;
        }
        let mut obj = self.event.as_object()?.clone();
        if !ID_KEYS.iter().any(|k| obj.contains_key(*k)) {
            obj.insert("id".to_string(), json!(self.event_id));
        }
        if !obj.contains_key("created_at") && !obj.contains_key("createdAt") {
            obj.insert("created_at".to_string(), json!(self.timestamp.to_rfc3339()));
        }
        Some(Value::Object(obj))
    }
}

/// LRU-bounded event store; the oldest events fall off first
pub struct IngestStore {
    events: Mutex<LruCache<String, StoredEvent>>,
}

impl IngestStore {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            events: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn insert(&self, stored: StoredEvent) {
        let mut events = self.events.lock().await;
        events.put(stored.event_id.clone(), stored);
    }

    pub async fn len(&self) -> usize {
        self.events.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Newest first
    pub async fn recent(&self, limit: usize) -> Vec<StoredEvent> {
        let events = self.events.lock().await;
        events.iter().take(limit).map(|(_, e)| e.clone()).collect()
    }

    pub async fn get_execution(&self, id: &str) -> Option<Value> {
        let events = self.events.lock().await;
        events.iter().find_map(|(_, e)| {
            let exec = e.as_execution()?;
            (execution_id(&exec) == Some(id)).then_some(exec)
        })
    }

    /// `{"executions": [...]}` page over execution-shaped events, newest
    /// first. Repeated updates for one execution collapse to the newest.
    pub async fn executions_payload(&self, query: &ExecutionQuery) -> Value {
        let status = query.status.as_deref().map(ExecutionStatus::parse);
        let events = self.events.lock().await;

        let mut seen = HashSet::new();
        let matching: Vec<Value> = events
            .iter()
            .filter_map(|(_, e)| e.as_execution())
            .filter(|exec| match execution_id(exec) {
                Some(id) => seen.insert(id.to_string()),
                None => true,
            })
            .filter(|exec| {
                let status_ok = status.map_or(true, |want| {
                    exec.get("status")
                        .and_then(Value::as_str)
                        .map(ExecutionStatus::parse)
                        == Some(want)
                });
                let flow_ok = query.flow_id.as_deref().map_or(true, |flow| {
                    ["flow_id", "flowId", "flow_name"]
                        .iter()
                        .any(|k| exec.get(*k).and_then(Value::as_str) == Some(flow))
                });
                status_ok && flow_ok
            })
            .collect();

        let total = matching.len();
        let page: Vec<Value> = matching
            .into_iter()
            .skip(query.offset())
            .take(query.limit())
            .collect();

        json!({
            "executions": page,
            "total": total,
            "source": "ingest",
        })
    }
}
