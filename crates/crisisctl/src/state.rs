//! Dashboard state, owned by the consumer loop, and the immutable snapshots
//! it publishes.

use crate::notify::{Banner, Notification, Notifier};
use crate::reconciler::Reconciler;
use chrono::{DateTime, Utc};
use crisis_common::{crisis_list, project, DashboardView, EventFilter, EventRecord, Execution};
use serde::Serialize;
use std::fmt;
use tracing::info;

/// Where the current execution list came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    /// No poll has completed yet
    Pending,
    Live,
    /// Backend reachable but empty; showing example data
    Example,
    /// Fetch failed; showing the last live list
    Stale,
    /// Fetch failed with no live list ever seen; showing example data
    Fallback,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Pending => "pending",
            DataSource::Live => "live",
            DataSource::Example => "example",
            DataSource::Stale => "stale",
            DataSource::Fallback => "fallback",
        }
    }

    pub fn is_example(&self) -> bool {
        matches!(self, DataSource::Example | DataSource::Fallback)
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one poll cycle
#[derive(Debug, Clone)]
pub struct PollOutcome {
    pub executions: Vec<Execution>,
    pub source: DataSource,
    pub warning: Option<String>,
    pub polled_at: DateTime<Utc>,
}

/// Everything the producer tasks send to the consumer loop
#[derive(Debug)]
pub enum DashboardMessage {
    Poll(PollOutcome),
    PushEvent(EventRecord),
    ChannelState { alive: bool },
    DismissBanner(String),
    ClearBanners,
}

/// Read-only view of the dashboard at one instant
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub executions: Vec<Execution>,
    pub events: Vec<EventRecord>,
    pub source: DataSource,
    pub warning: Option<String>,
    pub channel_alive: bool,
    pub banners: Vec<Banner>,
    pub last_poll: Option<DateTime<Utc>>,
    pub notifications_sent: usize,
}

impl DashboardSnapshot {
    pub fn view(&self, filter: &EventFilter) -> DashboardView {
        project(&self.executions, &self.events, filter)
    }
}

/// Mutable dashboard state. Each field has a single writer: poll results
/// replace `executions`, push events append to `events`, the reconciler owns
/// the previous crisis set.
pub struct DashboardState {
    executions: Vec<Execution>,
    events: Vec<EventRecord>,
    source: DataSource,
    warning: Option<String>,
    channel_alive: bool,
    last_poll: Option<DateTime<Utc>>,
    reconciler: Reconciler,
    notifier: Notifier,
    notifications_sent: usize,
}

impl DashboardState {
    pub fn new(notifier: Notifier) -> Self {
        Self {
            executions: Vec::new(),
            events: Vec::new(),
            source: DataSource::Pending,
            warning: None,
            channel_alive: false,
            last_poll: None,
            reconciler: Reconciler::new(),
            notifier,
            notifications_sent: 0,
        }
    }

    /// Apply one message. Returns the notifications fired by it.
    pub fn apply(&mut self, message: DashboardMessage, now: DateTime<Utc>) -> Vec<Notification> {
        let fired = match message {
            DashboardMessage::Poll(outcome) => self.apply_poll(outcome, now),
            DashboardMessage::PushEvent(event) => {
                self.events.push(event);
                Vec::new()
            }
            DashboardMessage::ChannelState { alive } => {
                if self.channel_alive != alive {
                    info!(
                        "Push channel {}",
                        if alive { "connected" } else { "down, polling only" }
                    );
                }
                self.channel_alive = alive;
                Vec::new()
            }
            DashboardMessage::DismissBanner(id) => {
                self.notifier.banners.dismiss(&id);
                Vec::new()
            }
            DashboardMessage::ClearBanners => {
                self.notifier.banners.clear_all();
                Vec::new()
            }
        };
        self.notifier.banners.prune(now);
        fired
    }

    fn apply_poll(&mut self, outcome: PollOutcome, now: DateTime<Utc>) -> Vec<Notification> {
        self.executions = outcome.executions;
        self.source = outcome.source;
        self.warning = outcome.warning;
        self.last_poll = Some(outcome.polled_at);

        let crises = crisis_list(&self.executions);
        let fired: Vec<Notification> = self
            .reconciler
            .reconcile(&crises)
            .into_iter()
            .map(Notification::for_crisis)
            .collect();

        for n in &fired {
            info!("New crisis: {}", n.title);
            self.notifier.deliver(n.clone(), now);
        }
        self.notifications_sent += fired.len();
        fired
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> DashboardSnapshot {
        DashboardSnapshot {
            executions: self.executions.clone(),
            events: self.events.clone(),
            source: self.source,
            warning: self.warning.clone(),
            channel_alive: self.channel_alive,
            banners: self.notifier.banners.active(now),
            last_poll: self.last_poll,
            notifications_sent: self.notifications_sent,
        }
    }
}
