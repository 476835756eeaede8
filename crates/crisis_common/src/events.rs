//! Notification-worthy events, pushed live or derived from executions.

use crate::execution::Execution;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// Push channel event kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "flowUpdate")]
    FlowUpdate,
    #[serde(rename = "newEvent")]
    NewEvent,
    #[serde(rename = "opsNotification")]
    OpsNotification,
    #[serde(rename = "humanApproval")]
    HumanApproval,
}

impl EventType {
    pub const ALL: [EventType; 4] = [
        EventType::FlowUpdate,
        EventType::NewEvent,
        EventType::OpsNotification,
        EventType::HumanApproval,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::FlowUpdate => "flowUpdate",
            EventType::NewEvent => "newEvent",
            EventType::OpsNotification => "opsNotification",
            EventType::HumanApproval => "humanApproval",
        }
    }

    /// Exact, case-sensitive match on the wire name
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|t| t.as_str() == s)
    }

    pub fn icon(&self) -> &'static str {
        match self {
            EventType::FlowUpdate => "🔄",
            EventType::NewEvent => "📝",
            EventType::OpsNotification => "🔔",
            EventType::HumanApproval => "👤",
        }
    }

    /// "opsNotification" -> "Ops Notification"
    pub fn title(&self) -> String {
        let mut out = String::new();
        for (i, c) in self.as_str().chars().enumerate() {
            if i == 0 {
                out.extend(c.to_uppercase());
            } else if c.is_uppercase() {
                out.push(' ');
                out.push(c);
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the event log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

impl EventRecord {
    pub fn new(event_type: EventType, data: Value, timestamp: DateTime<Utc>) -> Self {
        Self {
            event_type,
            timestamp,
            data,
        }
    }

    /// Synthesize the single event an execution contributes to the log.
    ///
    /// A created ticket makes it a `newEvent`, an ops notification an
    /// `opsNotification`, anything else a `flowUpdate`.
    pub fn from_execution(exec: &Execution) -> Self {
        let event_type = if exec.ticket_created() {
            EventType::NewEvent
        } else if exec.ops_notified() {
            EventType::OpsNotification
        } else {
            EventType::FlowUpdate
        };

        let data = json!({
            "execution_id": exec.id,
            "flow_name": exec.flow_name,
            "status": exec.status.as_str(),
            "input": Value::Object(exec.input.clone()),
            "output": exec.output.clone().map(Value::Object).unwrap_or(Value::Null),
        });

        Self::new(event_type, data, exec.timestamp())
    }

    /// Serialized payload used for free-text search
    pub fn searchable_data(&self) -> String {
        self.data.to_string()
    }
}

/// Wire frame on the push channel: one JSON object per line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushFrame {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl PushFrame {
    pub fn new(event_type: EventType, data: Value) -> Self {
        Self {
            event: event_type.as_str().to_string(),
            data,
        }
    }

    /// Recognized kind, if any
    pub fn event_type(&self) -> Option<EventType> {
        EventType::parse(&self.event)
    }

    /// Encode as a single NDJSON line, newline included
    pub fn to_line(&self) -> String {
        let mut line = serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string());
        line.push('\n');
        line
    }
}
