//! Flow execution records as reported by the orchestration platform.
//!
//! Records arrive in several shapes (wrapped or bare lists, camelCase or
//! snake_case keys, numeric or ISO timestamps). Normalization is permissive:
//! a malformed field gets a default, never an error.

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// Flow name used when a record carries none
pub const UNKNOWN_FLOW: &str = "unknown";

/// Default page size requested from the backend
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Execution lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Pending,
    Running,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Pending => "pending",
            ExecutionStatus::Running => "running",
            ExecutionStatus::Completed => "completed",
            ExecutionStatus::Failed => "failed",
            ExecutionStatus::Unknown => "unknown",
        }
    }

    /// Case-insensitive parse; anything unrecognized is `Unknown`
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" | "queued" => ExecutionStatus::Pending,
            "running" | "in_progress" => ExecutionStatus::Running,
            "completed" | "succeeded" | "success" => ExecutionStatus::Completed,
            "failed" | "error" => ExecutionStatus::Failed,
            _ => ExecutionStatus::Unknown,
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One run of an automated flow, normalized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub flow_name: String,
    pub status: ExecutionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    /// When this record was first normalized. Only used for ordering when
    /// the record has neither `created_at` nor `start_time`.
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub input: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// Set on the built-in demo records
    #[serde(default)]
    pub example: bool,
}

impl Execution {
    /// Normalize one raw record. Returns None for non-object values.
    pub fn from_value(raw: &Value, observed_at: DateTime<Utc>) -> Option<Self> {
        let obj = raw.as_object()?;

        let id = first_string(obj, &["id", "execution_id", "executionId"])
            .unwrap_or_else(|| anonymous_id(raw));
        let flow_name = first_string(obj, &["flow_name", "flowName", "flow"])
            .unwrap_or_else(|| UNKNOWN_FLOW.to_string());
        let status = obj
            .get("status")
            .and_then(Value::as_str)
            .map(ExecutionStatus::parse)
            .unwrap_or(ExecutionStatus::Unknown);

        let input = obj
            .get("input")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let output = obj.get("output").and_then(Value::as_object).cloned();

        let duration_ms = obj.get("duration").or_else(|| obj.get("duration_ms")).and_then(|v| {
            v.as_u64()
                .or_else(|| v.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64))
        });

        Some(Self {
            id,
            flow_name,
            status,
            created_at: first_timestamp(obj, &["created_at", "createdAt"]),
            start_time: first_timestamp(obj, &["start_time", "startTime", "started_at"]),
            end_time: first_timestamp(obj, &["end_time", "endTime", "finished_at"]),
            observed_at,
            input,
            output,
            duration_ms,
            example: false,
        })
    }

    /// Ordering timestamp: created_at, then start_time, then observation time
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.created_at
            .or(self.start_time)
            .unwrap_or(self.observed_at)
    }

    pub fn text(&self) -> Option<&str> {
        self.input.get("text").and_then(Value::as_str)
    }

    pub fn channel(&self) -> Option<&str> {
        self.input.get("channel").and_then(Value::as_str)
    }

    pub fn output_value(&self, key: &str) -> Option<&Value> {
        self.output.as_ref().and_then(|o| o.get(key))
    }

    pub fn output_str(&self, key: &str) -> Option<&str> {
        self.output_value(key).and_then(Value::as_str)
    }

    /// True only for a literal JSON `true`
    pub fn output_flag(&self, key: &str) -> bool {
        matches!(self.output_value(key), Some(Value::Bool(true)))
    }

    /// Output reports a created ticket, either as a flag or a ticket id
    pub fn ticket_created(&self) -> bool {
        self.output_flag("ticket_created")
            || matches!(self.output_value("ticketId"), Some(Value::String(s)) if !s.is_empty())
    }

    pub fn ops_notified(&self) -> bool {
        self.output_flag("ops_notified")
    }
}

/// Extract the record list from a backend payload.
///
/// Accepts `{"executions": [...]}`, `{"data": [...]}` or a bare array.
/// Anything else yields an empty list.
pub fn extract_records(payload: &Value) -> &[Value] {
    match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(obj) => ["executions", "data"]
            .iter()
            .find_map(|k| obj.get(*k).and_then(Value::as_array))
            .map(Vec::as_slice)
            .unwrap_or(&[]),
        _ => &[],
    }
}

/// Normalize a full backend payload.
///
/// Records sharing an id collapse into one: the entry keeps the position of
/// the first occurrence and the content of the last.
pub fn normalize_payload(payload: &Value, observed_at: DateTime<Utc>) -> Vec<Execution> {
    let mut out: Vec<Execution> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for raw in extract_records(payload) {
        let Some(exec) = Execution::from_value(raw, observed_at) else {
            continue;
        };
        match index.get(&exec.id) {
            Some(&pos) => out[pos] = exec,
            None => {
                index.insert(exec.id.clone(), out.len());
                out.push(exec);
            }
        }
    }

    out
}

/// The built-in demo data set shown when the backend has nothing to offer.
///
/// Always exactly four records, `exec-demo-001` through `exec-demo-004`,
/// timestamped relative to `now`.
pub fn example_executions(now: DateTime<Utc>) -> Vec<Execution> {
    let ago = |secs: i64| now - Duration::seconds(secs);

    let raw = json!([
        {
            "id": "exec-demo-001",
            "flow_name": "RealTimeCrisisFlow",
            "status": "completed",
            "created_at": ago(300).to_rfc3339(),
            "start_time": ago(300).to_rfc3339(),
            "end_time": ago(295).to_rfc3339(),
            "input": {
                "text": "Is IBM cloud down? can't access my bucket since 10:05. many people complaining #ibmclouddown",
                "channel": "twitter"
            },
            "output": {
                "crisis_detected": true,
                "crisis_score": 0.92,
                "crisis_type": "outage",
                "priority": "P1",
                "ticket_created": true,
                "ticketId": "TICK-demo-001",
                "ops_notified": true,
                "actions_taken": ["create_ticket", "post_social", "notify_ops"]
            }
        },
        {
            "id": "exec-demo-002",
            "flow_name": "RealTimeCrisisFlow",
            "status": "completed",
            "created_at": ago(600).to_rfc3339(),
            "start_time": ago(600).to_rfc3339(),
            "end_time": ago(595).to_rfc3339(),
            "input": {
                "text": "Billing issue - charged twice for November invoice, please refund",
                "channel": "chat"
            },
            "output": {
                "crisis_detected": false,
                "priority": "P2",
                "ticket_created": true,
                "ticketId": "TICK-demo-002"
            }
        },
        {
            "id": "exec-demo-003",
            "flow_name": "SocialScanScheduler",
            "status": "completed",
            "created_at": ago(900).to_rfc3339(),
            "start_time": ago(900).to_rfc3339(),
            "end_time": ago(895).to_rfc3339(),
            "input": { "keywords": "#ibmclouddown", "platform": "twitter" },
            "output": { "posts_found": 45, "crises_detected": 3 }
        },
        {
            "id": "exec-demo-004",
            "flow_name": "RealTimeCrisisFlow",
            "status": "running",
            "created_at": ago(120).to_rfc3339(),
            "start_time": ago(120).to_rfc3339(),
            "input": { "text": "Service outage affecting multiple regions", "channel": "email" },
            "output": { "crisis_detected": true, "priority": "P0" }
        }
    ]);

    normalize_payload(&raw, now)
        .into_iter()
        .map(|mut e| {
            e.example = true;
            e
        })
        .collect()
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|k| match obj.get(*k) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn first_timestamp(obj: &Map<String, Value>, keys: &[&str]) -> Option<DateTime<Utc>> {
    keys.iter().find_map(|k| obj.get(*k).and_then(parse_timestamp))
}

/// ISO-8601 strings or epoch milliseconds
pub fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok(),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Stable id for records that arrive without one
fn anonymous_id(raw: &Value) -> String {
    let digest = Sha256::digest(raw.to_string().as_bytes());
    format!("anon-{}", &hex::encode(digest)[..12])
}
