//! Normalization and projection properties over whole payloads

use chrono::{DateTime, Duration, TimeZone, Utc};
use crisis_common::{
    crisis_list, example_executions, normalize_payload, project, EventFilter, EventRecord,
    EventType, ExecutionStatus, SummaryStats,
};
use serde_json::{json, Value};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 11, 3, 10, 0, 0).unwrap()
}

fn payload() -> Value {
    json!([
        {"id": "a", "status": "running", "created_at": "2025-11-03T09:58:00Z",
         "input": {"text": "Site is down", "channel": "twitter"}},
        {"id": "b", "status": "completed", "created_at": "2025-11-03T09:50:00Z",
         "input": {"text": "hello"}, "output": {"ticket_created": true}},
        {"id": "c", "status": "completed", "created_at": "2025-11-03T09:40:00Z",
         "input": {"text": "critical security issue"},
         "output": {"priority": "P0", "crisis_type": "security", "crisis_score": 0.71}}
    ])
}

// ============================================================================
// Normalization
// ============================================================================

/// Wrapped and bare payloads normalize to the same list
#[test]
fn test_wrapped_and_bare_payloads_match() {
    let bare = normalize_payload(&payload(), now());
    let wrapped = normalize_payload(&json!({"executions": payload(), "total": 3}), now());
    assert_eq!(bare, wrapped);
    assert_eq!(bare.len(), 3);
}

/// Unusable payloads give an empty list rather than an error
#[test]
fn test_unusable_payloads_are_empty() {
    assert!(normalize_payload(&json!(null), now()).is_empty());
    assert!(normalize_payload(&json!("nope"), now()).is_empty());
    assert!(normalize_payload(&json!({"executions": "nope"}), now()).is_empty());
}

/// The later record for an id wins within one payload
#[test]
fn test_duplicate_ids_keep_last_content() {
    let raw = json!([
        {"id": "x", "status": "running"},
        {"id": "y", "status": "running"},
        {"id": "x", "status": "completed"}
    ]);
    let execs = normalize_payload(&raw, now());
    assert_eq!(execs.len(), 2);
    assert_eq!(execs[0].id, "x");
    assert_eq!(execs[0].status, ExecutionStatus::Completed);
}

/// Records without ids get the same derived id on every poll
#[test]
fn test_anonymous_ids_are_stable() {
    let raw = json!([{"status": "running", "input": {"text": "down again"}}]);
    let first = normalize_payload(&raw, now());
    let second = normalize_payload(&raw, now() + Duration::seconds(5));
    assert!(first[0].id.starts_with("anon-"));
    assert_eq!(first[0].id, second[0].id);
}

// ============================================================================
// Projection
// ============================================================================

/// Same input, same output; the input is untouched
#[test]
fn test_projection_is_idempotent() {
    let execs = normalize_payload(&payload(), now());
    let pushed = vec![EventRecord::new(EventType::OpsNotification, json!({"team": "sre"}), now())];
    let before = execs.clone();
    let filter = EventFilter::default();

    let first = project(&execs, &pushed, &filter);
    let second = project(&execs, &pushed, &filter);
    assert_eq!(first, second);
    assert_eq!(execs, before);
}

/// Stats only reflect the list they are given
#[test]
fn test_stats_do_not_accumulate() {
    let execs = normalize_payload(&payload(), now());
    let once = SummaryStats::compute(&execs);
    let _ = SummaryStats::compute(&execs);
    let again = SummaryStats::compute(&execs);
    assert_eq!(once, again);

    assert_eq!(once.total_crises, 2);
    assert_eq!(once.active_flows, 1);
    assert_eq!(once.tickets_created, 1);
    assert_eq!(once.avg_response_time_secs, 4.6);
}

/// P0 before P1, regardless of recency
#[test]
fn test_crisis_ordering_by_priority() {
    let execs = normalize_payload(&payload(), now());
    let ids: Vec<String> = crisis_list(&execs).into_iter().map(|c| c.id).collect();
    assert_eq!(ids, vec!["c", "a"]);

    let c = &crisis_list(&execs)[0];
    assert_eq!(c.label, "Security Crisis");
    assert_eq!(c.score_percent, 71);
}

/// Event filter narrows the list but the total stays the union size
#[test]
fn test_event_filter_keeps_total() {
    let execs = example_executions(now());
    let pushed = vec![
        EventRecord::new(EventType::HumanApproval, json!({"request_id": "apr-9"}), now()),
        EventRecord::new(EventType::OpsNotification, json!({"team": "sre"}), now()),
    ];
    let filter = EventFilter {
        event_type: Some(EventType::HumanApproval),
        search: String::new(),
    };
    let view = project(&execs, &pushed, &filter);
    assert_eq!(view.events.total, 6);
    assert_eq!(view.events.shown(), 1);

    let search = EventFilter {
        event_type: None,
        search: "APR-9".into(),
    };
    assert_eq!(project(&execs, &pushed, &search).events.shown(), 1);
}
