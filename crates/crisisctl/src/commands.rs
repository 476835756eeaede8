//! Command handlers for crisisctl.

use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use crisis_common::config::DashboardConfig;
use crisis_common::{
    crisis_list, crisis_summary, execution_detail, execution_list, EventFilter, EventType,
    ExecutionStatus, SummaryStats,
};
use crisisctl::client::ApiClient;
use crisisctl::dashboard::{Dashboard, DashboardOptions};
use crisisctl::notify::{AlertSink, DesktopSink};
use crisisctl::poller::Poller;
use crisisctl::render;
use crisisctl::state::DashboardSnapshot;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// Clear screen and move the cursor home
const CLEAR: &str = "\x1b[2J\x1b[H";

const WATCH_HELP: &str = "r refresh · d <id> dismiss · c clear · Ctrl-C quit";

/// A line typed while `watch` is running
#[derive(Debug, Clone, PartialEq)]
enum WatchCommand {
    Refresh,
    Dismiss(String),
    Clear,
}

impl WatchCommand {
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        let cmd = parts.next()?;
        let arg = parts.next();
        match (cmd.to_ascii_lowercase().as_str(), arg) {
            ("r" | "refresh", None) => Some(Self::Refresh),
            ("c" | "clear", None) => Some(Self::Clear),
            ("d" | "dismiss", Some(id)) => Some(Self::Dismiss(id.to_string())),
            _ => None,
        }
    }
}

fn client(config: &DashboardConfig) -> Result<ApiClient> {
    ApiClient::new(&config.backend_url, config.connect_timeout())
        .context("failed to build HTTP client")
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One poll cycle wrapped as a snapshot, for the one-shot commands
async fn fetch_snapshot(config: &DashboardConfig) -> Result<DashboardSnapshot> {
    let api = client(config)?;
    let mut poller = Poller::new(Arc::new(api), config.page_size);
    let outcome = poller.poll_once(Utc::now()).await;
    Ok(DashboardSnapshot {
        executions: outcome.executions,
        events: Vec::new(),
        source: outcome.source,
        warning: outcome.warning,
        channel_alive: false,
        banners: Vec::new(),
        last_poll: Some(outcome.polled_at),
        notifications_sent: 0,
    })
}

fn print_source(snapshot: &DashboardSnapshot) {
    println!("{}", render::render_source(snapshot));
    println!();
}

pub async fn health(config: &DashboardConfig, json: bool) -> Result<()> {
    let api = client(config)?;
    let status = api
        .health()
        .await
        .with_context(|| format!("backend at {} is not reachable", config.backend_url))?;

    if json {
        return print_json(&status);
    }

    let ok = status["status"].as_str() == Some("ok");
    println!(
        "{} {}",
        if ok { "✓".green().to_string() } else { "✗".red().to_string() },
        status["service"].as_str().unwrap_or("backend")
    );
    println!("  url:          {}", config.backend_url);
    println!("  status:       {}", status["status"].as_str().unwrap_or("unknown"));
    if let Some(uptime) = status["uptime_secs"].as_u64() {
        println!("  uptime:       {}s", uptime);
    }
    if let Some(push) = status["push_channel"].as_bool() {
        println!("  push channel: {}", if push { "enabled" } else { "disabled" });
    }
    Ok(())
}

pub async fn stats(config: &DashboardConfig, json: bool) -> Result<()> {
    let snapshot = fetch_snapshot(config).await?;
    let stats = SummaryStats::compute(&snapshot.executions);
    if json {
        return print_json(&stats);
    }
    print_source(&snapshot);
    println!("{}", render::render_stats(&stats));
    Ok(())
}

pub async fn executions(
    config: &DashboardConfig,
    status: Option<String>,
    id: Option<String>,
    json: bool,
) -> Result<()> {
    let snapshot = fetch_snapshot(config).await?;

    if let Some(id) = id {
        let detail = execution_detail(&snapshot.executions, &id)
            .ok_or_else(|| anyhow!("execution '{}' not found", id))?;
        if json {
            return print_json(&detail);
        }
        print_source(&snapshot);
        println!("{}", render::render_execution_detail(&detail));
        return Ok(());
    }

    let status = status.map(|s| ExecutionStatus::parse(&s));
    if status == Some(ExecutionStatus::Unknown) {
        bail!("unknown status; use pending, running, completed or failed");
    }
    let rows = execution_list(&snapshot.executions, status);
    if json {
        return print_json(&rows);
    }
    print_source(&snapshot);
    print!("{}", render::render_executions(&rows, Utc::now()));
    Ok(())
}

pub async fn crises(config: &DashboardConfig, json: bool) -> Result<()> {
    let snapshot = fetch_snapshot(config).await?;
    let crises = crisis_list(&snapshot.executions);
    if json {
        return print_json(&crises);
    }
    print_source(&snapshot);
    print!(
        "{}",
        render::render_crises(&crises, &crisis_summary(&crises), Utc::now())
    );
    Ok(())
}

pub async fn events(
    config: &DashboardConfig,
    event_type: Option<String>,
    search: String,
    json: bool,
) -> Result<()> {
    let event_type = match event_type {
        Some(t) => Some(EventType::parse(&t).ok_or_else(|| {
            anyhow!("unknown event type '{}'; use flowUpdate, newEvent, opsNotification or humanApproval", t)
        })?),
        None => None,
    };
    let filter = EventFilter { event_type, search };

    let snapshot = fetch_snapshot(config).await?;
    let log = snapshot.view(&filter).events;
    if json {
        return print_json(&log);
    }
    print_source(&snapshot);
    print!("{}", render::render_events(&log, Utc::now()));
    Ok(())
}

pub async fn trigger(config: &DashboardConfig, text: &str, channel: &str, json: bool) -> Result<()> {
    if text.trim().is_empty() {
        bail!("--text must not be empty");
    }
    let api = client(config)?;
    let result = api
        .trigger_flow(text, channel)
        .await
        .context("failed to trigger flow")?;
    if json {
        return print_json(&result);
    }
    println!("{} Flow triggered", "✓".green());
    if let Some(id) = result["id"].as_str().or(result["execution_id"].as_str()) {
        println!("  execution: {}", id.cyan());
    }
    Ok(())
}

async fn system_sink(config: &DashboardConfig) -> Option<Arc<dyn AlertSink>> {
    if !config.system_alerts {
        return None;
    }
    if DesktopSink::is_available().await {
        Some(Arc::new(DesktopSink::new("Crisis Monitor")))
    } else {
        info!("No desktop notification service, banners only");
        None
    }
}

pub async fn watch(config: &DashboardConfig, interval: Option<u64>, json: bool) -> Result<()> {
    let mut options = DashboardOptions::from(config);
    if let Some(secs) = interval {
        options.poll_interval = Duration::from_secs(secs.max(1));
    }

    let api = client(config)?;
    let mut dashboard = Dashboard::start(
        Arc::new(api.clone()),
        Some(api),
        options,
        system_sink(config).await,
    );
    let mut snapshots = dashboard.subscribe();
    let filter = EventFilter::default();

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut input_open = true;

    loop {
        tokio::select! {
            res = &mut shutdown => {
                if let Err(e) = res {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
            line = input.next_line(), if input_open => {
                match line {
                    Ok(Some(line)) => match WatchCommand::parse(&line) {
                        Some(WatchCommand::Refresh) => dashboard.refresh().await,
                        Some(WatchCommand::Dismiss(id)) => dashboard.dismiss_banner(&id).await,
                        Some(WatchCommand::Clear) => dashboard.clear_banners().await,
                        None => debug!("Ignoring watch input {:?}", line),
                    },
                    // stdin closed or unreadable: keep watching without commands
                    Ok(None) => input_open = false,
                    Err(e) => {
                        warn!("Failed to read stdin: {}", e);
                        input_open = false;
                    }
                }
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = snapshots.borrow_and_update().clone();
                if json {
                    println!("{}", serde_json::to_string(&*snapshot)?);
                } else {
                    let view = snapshot.view(&filter);
                    print!("{}{}", CLEAR, render::render_dashboard(&snapshot, &view, Utc::now()));
                    println!("\n{}", WATCH_HELP.dimmed());
                }
                io::stdout().flush()?;
            }
        }
    }

    dashboard.shutdown();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_command_parse() {
        assert_eq!(WatchCommand::parse("r"), Some(WatchCommand::Refresh));
        assert_eq!(WatchCommand::parse("  refresh \n"), Some(WatchCommand::Refresh));
        assert_eq!(WatchCommand::parse("C"), Some(WatchCommand::Clear));
        assert_eq!(
            WatchCommand::parse("d N12"),
            Some(WatchCommand::Dismiss("N12".to_string()))
        );
    }

    #[test]
    fn test_watch_command_rejects_bad_input() {
        assert_eq!(WatchCommand::parse(""), None);
        assert_eq!(WatchCommand::parse("d"), None);
        assert_eq!(WatchCommand::parse("r now"), None);
        assert_eq!(WatchCommand::parse("quit"), None);
    }
}
