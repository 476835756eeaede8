//! Shared types for the crisis monitor: execution records, crisis
//! classification, event records, dashboard view projections and config.

pub mod classify;
pub mod config;
pub mod error;
pub mod events;
pub mod execution;
pub mod projection;

pub use classify::{classify, priority_rank, Classification, CrisisType, Priority};
pub use config::CrisisConfig;
pub use error::{CrisisError, Result};
pub use events::{EventRecord, EventType, PushFrame};
pub use execution::{example_executions, normalize_payload, Execution, ExecutionStatus};
pub use projection::{
    crisis_list, crisis_summary, event_log, execution_detail, execution_list, project,
    CrisisSummary, CrisisView, DashboardView, EventFilter, EventLogView, ExecutionDetail,
    ExecutionRow, SummaryStats,
};
