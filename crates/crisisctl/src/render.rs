//! Terminal rendering for the dashboard views.
//!
//! Every function returns a `String`; printing is left to the caller.

use crate::notify::Banner;
use crate::state::{DashboardSnapshot, DataSource};
use chrono::{DateTime, Utc};
use crisis_common::{
    priority_rank, CrisisSummary, CrisisView, DashboardView, EventLogView, ExecutionDetail,
    ExecutionRow, ExecutionStatus, SummaryStats,
};
use owo_colors::OwoColorize;
use std::fmt::Write;

const SEPARATOR: &str = "────────────────────────────────────────────────────────────";
const TEXT_WIDTH: usize = 72;

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

/// "42s ago", "5m ago", "3h ago", "2d ago"
pub fn relative_time(ts: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - ts).num_seconds().max(0);
    match secs {
        0..=59 => format!("{}s ago", secs),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}

fn status_badge(status: ExecutionStatus) -> String {
    let label = format!("{:<9}", status.as_str());
    match status {
        ExecutionStatus::Completed => label.green().to_string(),
        ExecutionStatus::Running => label.cyan().to_string(),
        ExecutionStatus::Failed => label.red().to_string(),
        ExecutionStatus::Pending => label.yellow().to_string(),
        ExecutionStatus::Unknown => label.dimmed().to_string(),
    }
}

fn priority_badge(priority: &str) -> String {
    let label = format!("[{}]", priority);
    match priority_rank(priority) {
        0 => label.bright_red().bold().to_string(),
        1 => label.red().to_string(),
        2 => label.yellow().to_string(),
        _ => label.dimmed().to_string(),
    }
}

pub fn render_source(snapshot: &DashboardSnapshot) -> String {
    let mut out = String::new();
    let source = match snapshot.source {
        DataSource::Live => "LIVE".green().to_string(),
        DataSource::Pending => "WAITING".dimmed().to_string(),
        DataSource::Example => "EXAMPLE DATA".yellow().to_string(),
        DataSource::Stale => "STALE".yellow().to_string(),
        DataSource::Fallback => "EXAMPLE DATA (backend unreachable)".yellow().to_string(),
    };
    let channel = if snapshot.channel_alive {
        "push: connected".green().to_string()
    } else {
        "push: off, polling".dimmed().to_string()
    };
    let _ = write!(out, "[{}]  {}", source, channel);
    if let Some(last) = snapshot.last_poll {
        let _ = write!(out, "  last poll {}", last.format("%H:%M:%S"));
    }
    if let Some(warning) = &snapshot.warning {
        let _ = write!(out, "\n[WARNING] {}", warning.yellow());
    }
    out
}

pub fn render_stats(stats: &SummaryStats) -> String {
    format!(
        "Crises: {}   Active flows: {}   Tickets: {}   Avg response: {:.1}s",
        stats.total_crises.to_string().bright_red().bold(),
        stats.active_flows.to_string().cyan().bold(),
        stats.tickets_created.to_string().green().bold(),
        stats.avg_response_time_secs
    )
}

pub fn render_executions(rows: &[ExecutionRow], now: DateTime<Utc>) -> String {
    if rows.is_empty() {
        return "No executions.".dimmed().to_string();
    }
    let mut out = String::new();
    for row in rows {
        let duration = row
            .duration_ms
            .map(|ms| format!("{:.1}s", ms as f64 / 1000.0))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {} {:<22} {:<24} {:>7}  {}{}",
            status_badge(row.status),
            truncate(&row.id, 22),
            truncate(&row.flow_name, 24),
            duration,
            relative_time(row.timestamp, now).dimmed(),
            if row.example { " (example)".dimmed().to_string() } else { String::new() }
        );
    }
    out
}

pub fn render_execution_detail(detail: &ExecutionDetail) -> String {
    let pretty = |v: &serde_json::Value| {
        serde_json::to_string_pretty(v).unwrap_or_else(|_| v.to_string())
    };
    format!(
        "{} {}\n  flow: {}\n  status: {}\n  time: {}\n\n{}\n{}\n\n{}\n{}",
        "Execution".bold(),
        detail.id.cyan(),
        detail.flow_name,
        status_badge(detail.status),
        detail.timestamp.to_rfc3339(),
        "Input".bold(),
        pretty(&detail.input),
        "Output".bold(),
        pretty(&detail.output)
    )
}

pub fn render_crises(crises: &[CrisisView], summary: &CrisisSummary, now: DateTime<Utc>) -> String {
    let mut out = format!(
        "{} total, {} high priority, {} outages\n",
        summary.total,
        summary.high_priority.to_string().red(),
        summary.outages
    );
    if crises.is_empty() {
        let _ = writeln!(out, "{}", "No active crises.".green());
        return out;
    }
    for c in crises {
        let _ = writeln!(
            out,
            "  {} {} {}  score {}%  via {}  {}",
            c.icon,
            priority_badge(&c.priority),
            c.label.bold(),
            c.score_percent,
            c.channel,
            relative_time(c.timestamp, now).dimmed()
        );
        let _ = writeln!(out, "      {}", truncate(&c.text, TEXT_WIDTH));
        if !c.actions.is_empty() {
            let _ = writeln!(out, "      actions: {}", c.actions.join(", ").dimmed());
        }
    }
    out
}

pub fn render_events(log: &EventLogView, now: DateTime<Utc>) -> String {
    let mut out = format!("Showing {} of {} events\n", log.shown(), log.total);
    for e in &log.events {
        let _ = writeln!(
            out,
            "  {} {:<17} {:>8}  {}",
            e.event_type.icon(),
            e.event_type.title(),
            relative_time(e.timestamp, now).dimmed(),
            truncate(&e.data.to_string(), TEXT_WIDTH - 20).dimmed()
        );
    }
    out
}

pub fn render_banners(banners: &[Banner], now: DateTime<Utc>) -> String {
    let mut out = String::new();
    for b in banners.iter().filter(|b| b.expires_at > now) {
        let _ = writeln!(
            out,
            "{} {} {}  {}",
            "▶".bright_red(),
            format!("[{}]", b.notification.id).dimmed(),
            b.notification.title.bold(),
            truncate(&b.notification.body, TEXT_WIDTH).dimmed()
        );
    }
    out
}

/// Full-screen dashboard: status, banners, stats, crises, executions, events
pub fn render_dashboard(snapshot: &DashboardSnapshot, view: &DashboardView, now: DateTime<Utc>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", "CRISIS MONITOR".bold());
    let _ = writeln!(out, "{}", render_source(snapshot));
    let banners = render_banners(&snapshot.banners, now);
    if !banners.is_empty() {
        let _ = write!(out, "\n{}", banners);
    }
    let _ = writeln!(out, "{}", SEPARATOR.dimmed());
    let _ = writeln!(out, "{}", render_stats(&view.stats));
    let _ = writeln!(out, "{}", SEPARATOR.dimmed());
    let _ = writeln!(out, "{}", "Crises".bold());
    let _ = write!(out, "{}", render_crises(&view.crises, &view.crisis_summary, now));
    let _ = writeln!(out, "{}", SEPARATOR.dimmed());
    let _ = writeln!(out, "{}", "Executions".bold());
    let _ = write!(out, "{}", render_executions(&view.executions, now));
    let _ = writeln!(out, "{}", SEPARATOR.dimmed());
    let _ = writeln!(out, "{}", "Events".bold());
    let _ = write!(out, "{}", render_events(&view.events, now));
    out
}
