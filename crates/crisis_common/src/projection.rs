//! Dashboard view projections.
//!
//! Every function here is pure: it borrows the current execution/event set,
//! never mutates it, and returns the same output for the same input. Sorting
//! is stable, so ties keep the input order across re-renders.

use crate::classify::{classify, priority_rank};
use crate::events::{EventRecord, EventType};
use crate::execution::{Execution, ExecutionStatus};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

/// Seconds of "response time" credited per completed execution.
///
/// The average response time counter is a placeholder, not a latency
/// measurement: it is `completed_count * RESPONSE_TIME_UNIT_SECS`.
pub const RESPONSE_TIME_UNIT_SECS: f64 = 2.3;

// ============================================================================
// Summary stats
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total_crises: usize,
    pub active_flows: usize,
    pub tickets_created: usize,
    pub avg_response_time_secs: f64,
}

impl SummaryStats {
    /// Compute from the current list only; nothing carries over between cycles
    pub fn compute(executions: &[Execution]) -> Self {
        let total_crises = executions
            .iter()
            .filter(|e| classify(e).is_crisis)
            .count();
        let active_flows = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Running)
            .count();
        let completed: Vec<&Execution> = executions
            .iter()
            .filter(|e| e.status == ExecutionStatus::Completed)
            .collect();
        let tickets_created = completed.iter().filter(|e| e.ticket_created()).count();

        // One decimal, so 3 * 2.3 reads 6.9 rather than 6.8999...
        let avg = (completed.len() as f64 * RESPONSE_TIME_UNIT_SECS * 10.0).round() / 10.0;

        Self {
            total_crises,
            active_flows,
            tickets_created,
            avg_response_time_secs: avg,
        }
    }
}

// ============================================================================
// Execution list + detail
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionRow {
    pub id: String,
    pub flow_name: String,
    pub status: ExecutionStatus,
    pub timestamp: DateTime<Utc>,
    pub duration_ms: Option<u64>,
    pub example: bool,
}

/// Executions newest first, optionally restricted to one status
pub fn execution_list(
    executions: &[Execution],
    status: Option<ExecutionStatus>,
) -> Vec<ExecutionRow> {
    let mut rows: Vec<ExecutionRow> = executions
        .iter()
        .filter(|e| status.map_or(true, |s| e.status == s))
        .map(|e| ExecutionRow {
            id: e.id.clone(),
            flow_name: e.flow_name.clone(),
            status: e.status,
            timestamp: e.timestamp(),
            duration_ms: e.duration_ms,
            example: e.example,
        })
        .collect();

    rows.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionDetail {
    pub id: String,
    pub flow_name: String,
    pub status: ExecutionStatus,
    pub timestamp: DateTime<Utc>,
    pub input: Value,
    pub output: Value,
}

pub fn execution_detail(executions: &[Execution], id: &str) -> Option<ExecutionDetail> {
    executions.iter().find(|e| e.id == id).map(|e| ExecutionDetail {
        id: e.id.clone(),
        flow_name: e.flow_name.clone(),
        status: e.status,
        timestamp: e.timestamp(),
        input: Value::Object(e.input.clone()),
        output: e.output.clone().map(Value::Object).unwrap_or(Value::Null),
    })
}

// ============================================================================
// Crisis list
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrisisView {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub channel: String,
    pub crisis_type: String,
    pub icon: String,
    pub label: String,
    pub priority: String,
    /// Clamped to [0, 1]
    pub score: f64,
    /// `score` as a whole percentage
    pub score_percent: u8,
    pub actions: Vec<String>,
    pub metadata: Value,
}

impl CrisisView {
    fn from_execution(exec: &Execution) -> Option<Self> {
        let c = classify(exec);
        if !c.is_crisis {
            return None;
        }

        let actions = exec
            .output_value("actions_taken")
            .and_then(Value::as_array)
            .map(|a| {
                a.iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let metadata = exec
            .input
            .get("metadata")
            .filter(|m| m.is_object())
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));

        Some(Self {
            id: exec.id.clone(),
            timestamp: exec.timestamp(),
            text: exec.text().unwrap_or("Unknown").to_string(),
            channel: exec.channel().unwrap_or("unknown").to_string(),
            crisis_type: c.crisis_type.as_str().to_string(),
            icon: c.crisis_type.icon().to_string(),
            label: c.crisis_type.label(),
            priority: c.priority,
            score: c.score,
            score_percent: (c.score * 100.0).round() as u8,
            actions,
            metadata,
        })
    }

    pub fn is_high_priority(&self) -> bool {
        priority_rank(&self.priority) <= 1
    }
}

/// Crisis-classified executions: P0 first through P3/unknown, newest first
/// within a priority
pub fn crisis_list(executions: &[Execution]) -> Vec<CrisisView> {
    let mut crises: Vec<CrisisView> = executions
        .iter()
        .filter_map(CrisisView::from_execution)
        .collect();

    crises.sort_by(|a, b| {
        priority_rank(&a.priority)
            .cmp(&priority_rank(&b.priority))
            .then_with(|| b.timestamp.cmp(&a.timestamp))
    });
    crises
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrisisSummary {
    pub total: usize,
    pub high_priority: usize,
    pub outages: usize,
}

pub fn crisis_summary(crises: &[CrisisView]) -> CrisisSummary {
    CrisisSummary {
        total: crises.len(),
        high_priority: crises.iter().filter(|c| c.is_high_priority()).count(),
        outages: crises.iter().filter(|c| c.crisis_type == "outage").count(),
    }
}

// ============================================================================
// Event log
// ============================================================================

/// User-supplied event log filter
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    /// None shows every type
    pub event_type: Option<EventType>,
    /// Case-insensitive substring over the serialized payload; empty matches all
    pub search: String,
}

impl EventFilter {
    pub fn matches(&self, event: &EventRecord) -> bool {
        let type_ok = self.event_type.map_or(true, |t| event.event_type == t);
        let search = self.search.trim();
        let search_ok = search.is_empty()
            || event
                .searchable_data()
                .to_lowercase()
                .contains(&search.to_lowercase());
        type_ok && search_ok
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventLogView {
    pub events: Vec<EventRecord>,
    /// Size of the unfiltered union
    pub total: usize,
}

impl EventLogView {
    pub fn shown(&self) -> usize {
        self.events.len()
    }
}

/// Push-channel events plus one synthesized event per execution, newest
/// first, then filtered
pub fn event_log(
    pushed: &[EventRecord],
    executions: &[Execution],
    filter: &EventFilter,
) -> EventLogView {
    let mut all: Vec<EventRecord> = pushed
        .iter()
        .cloned()
        .chain(executions.iter().map(EventRecord::from_execution))
        .collect();
    all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    let total = all.len();
    let events = all.into_iter().filter(|e| filter.matches(e)).collect();

    EventLogView { events, total }
}

// ============================================================================
// Whole dashboard
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardView {
    pub stats: SummaryStats,
    pub executions: Vec<ExecutionRow>,
    pub crises: Vec<CrisisView>,
    pub crisis_summary: CrisisSummary,
    pub events: EventLogView,
}

/// All four views at once
pub fn project(
    executions: &[Execution],
    pushed: &[EventRecord],
    filter: &EventFilter,
) -> DashboardView {
    let crises = crisis_list(executions);
    DashboardView {
        stats: SummaryStats::compute(executions),
        executions: execution_list(executions, None),
        crisis_summary: crisis_summary(&crises),
        crises,
        events: event_log(pushed, executions, filter),
    }
}
