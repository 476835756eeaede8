//! Notification sinks for new crises.
//!
//! Two independent channels:
//! - in-app banners (`BannerBoard`), shown by the dashboard and auto-expiring
//! - system alerts (`AlertSink`), desktop notifications via notify-send
//!
//! A failing or slow system sink never delays or suppresses the banner.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use crisis_common::{priority_rank, CrisisView};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Longest crisis text carried into a notification body
const BODY_MAX_CHARS: usize = 140;

static NEXT_NOTIFICATION: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    /// Unique per notification, e.g. `N7`; banners are dismissed by this
    pub id: String,
    /// Execution id of the crisis
    pub crisis_id: String,
    pub title: String,
    pub body: String,
    pub priority: String,
}

impl Notification {
    pub fn for_crisis(crisis: &CrisisView) -> Self {
        let mut body: String = crisis.text.chars().take(BODY_MAX_CHARS).collect();
        if crisis.text.chars().count() > BODY_MAX_CHARS {
            body.push('…');
        }
        let seq = NEXT_NOTIFICATION.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("N{}", seq),
            crisis_id: crisis.id.clone(),
            title: format!("{} {} ({})", crisis.icon, crisis.label, crisis.priority),
            body,
            priority: crisis.priority.clone(),
        }
    }

    /// notify-send urgency for this priority
    pub fn urgency(&self) -> &'static str {
        match priority_rank(&self.priority) {
            0 | 1 => "critical",
            2 => "normal",
            _ => "low",
        }
    }
}

// ============================================================================
// In-app banners
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Banner {
    pub notification: Notification,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Banners in newest-first order. Expiry is lazy: `active(now)` hides
/// anything past its deadline and `prune(now)` drops it.
#[derive(Debug, Clone)]
pub struct BannerBoard {
    ttl: Duration,
    banners: Vec<Banner>,
}

impl BannerBoard {
    pub fn new(ttl: std::time::Duration) -> Self {
        Self {
            ttl: Duration::from_std(ttl).unwrap_or_else(|_| Duration::seconds(5)),
            banners: Vec::new(),
        }
    }

    pub fn push(&mut self, notification: Notification, now: DateTime<Utc>) {
        self.banners.insert(
            0,
            Banner {
                notification,
                created_at: now,
                expires_at: now + self.ttl,
            },
        );
    }

    pub fn active(&self, now: DateTime<Utc>) -> Vec<Banner> {
        self.banners
            .iter()
            .filter(|b| b.expires_at > now)
            .cloned()
            .collect()
    }

    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.banners.retain(|b| b.expires_at > now);
    }

    /// Remove one banner by notification id. Returns whether anything was
    /// removed.
    pub fn dismiss(&mut self, id: &str) -> bool {
        let before = self.banners.len();
        self.banners.retain(|b| b.notification.id != id);
        self.banners.len() != before
    }

    pub fn clear_all(&mut self) {
        self.banners.clear();
    }
}

// ============================================================================
// System alerts
// ============================================================================

#[derive(Error, Debug)]
pub enum AlertError {
    #[error("notifier unavailable: {0}")]
    Unavailable(String),

    #[error("notifier failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    fn name(&self) -> &'static str;

    async fn alert(&self, notification: &Notification) -> Result<(), AlertError>;
}

/// Desktop notifications through notify-send
pub struct DesktopSink {
    app_name: String,
}

impl DesktopSink {
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            app_name: app_name.into(),
        }
    }

    /// notify-send on PATH and a display to talk to
    pub async fn is_available() -> bool {
        let has_display = std::env::var_os("DISPLAY").is_some()
            || std::env::var_os("WAYLAND_DISPLAY").is_some();
        if !has_display {
            return false;
        }
        Command::new("which")
            .arg("notify-send")
            .output()
            .await
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

#[async_trait]
impl AlertSink for DesktopSink {
    fn name(&self) -> &'static str {
        "notify-send"
    }

    async fn alert(&self, notification: &Notification) -> Result<(), AlertError> {
        let output = Command::new("notify-send")
            .args([
                "--urgency",
                notification.urgency(),
                "--app-name",
                self.app_name.as_str(),
                notification.title.as_str(),
                notification.body.as_str(),
            ])
            .output()
            .await?;

        if output.status.success() {
            info!("Desktop notification sent for {}", notification.crisis_id);
            Ok(())
        } else {
            Err(AlertError::Failed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }
}

/// Both sinks together. The system sink is optional and runs detached.
pub struct Notifier {
    pub banners: BannerBoard,
    system: Option<Arc<dyn AlertSink>>,
}

impl Notifier {
    pub fn new(banners: BannerBoard, system: Option<Arc<dyn AlertSink>>) -> Self {
        if let Some(sink) = &system {
            debug!("System alerts via {}", sink.name());
        }
        Self { banners, system }
    }

    /// Show the banner now and fire the system alert in the background.
    /// Must run inside a tokio runtime when a system sink is set.
    pub fn deliver(&mut self, notification: Notification, now: DateTime<Utc>) {
        if let Some(sink) = &self.system {
            let sink = Arc::clone(sink);
            let n = notification.clone();
            tokio::spawn(async move {
                if let Err(e) = sink.alert(&n).await {
                    warn!("{} alert for {} failed: {}", sink.name(), n.crisis_id, e);
                }
            });
        }
        self.banners.push(notification, now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::time::Duration as StdDuration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 11, 3, 10, 0, 0).unwrap()
    }

    fn note(id: &str, priority: &str) -> Notification {
        Notification {
            id: id.to_string(),
            crisis_id: format!("exec-{}", id),
            title: format!("crisis {}", id),
            body: String::new(),
            priority: priority.to_string(),
        }
    }

    #[test]
    fn test_banner_expires_after_ttl() {
        let mut board = BannerBoard::new(StdDuration::from_secs(5));
        board.push(note("a", "P1"), now());

        assert_eq!(board.active(now() + Duration::seconds(4)).len(), 1);
        assert!(board.active(now() + Duration::seconds(5)).is_empty());

        board.prune(now() + Duration::seconds(6));
        assert!(board.active(now()).is_empty());
    }

    #[test]
    fn test_dismiss_and_clear() {
        let mut board = BannerBoard::new(StdDuration::from_secs(5));
        board.push(note("a", "P1"), now());
        board.push(note("b", "P2"), now());

        assert!(board.dismiss("a"));
        assert!(!board.dismiss("a"));
        let active = board.active(now());
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].notification.id, "b");

        board.clear_all();
        assert!(board.active(now()).is_empty());
    }

    fn crisis(id: &str) -> CrisisView {
        CrisisView {
            id: id.to_string(),
            timestamp: now(),
            text: "service is down".to_string(),
            channel: "twitter".to_string(),
            crisis_type: "outage".to_string(),
            icon: "🔴".to_string(),
            label: "Outage Crisis".to_string(),
            priority: "P1".to_string(),
            score: 0.0,
            score_percent: 0,
            actions: vec![],
            metadata: serde_json::json!({}),
        }
    }

    #[test]
    fn test_same_crisis_twice_gets_separate_banners() {
        let mut board = BannerBoard::new(StdDuration::from_secs(5));
        let first = Notification::for_crisis(&crisis("e1"));
        let second = Notification::for_crisis(&crisis("e1"));
        assert_ne!(first.id, second.id);
        assert_eq!(first.crisis_id, second.crisis_id);

        board.push(first.clone(), now());
        board.push(second.clone(), now());

        assert!(board.dismiss(&first.id));
        let active = board.active(now());
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].notification.id, second.id);
    }

    #[test]
    fn test_urgency_from_priority() {
        assert_eq!(note("a", "P0").urgency(), "critical");
        assert_eq!(note("a", "P2").urgency(), "normal");
        assert_eq!(note("a", "whatever").urgency(), "low");
    }

    struct FailingSink;

    #[async_trait]
    impl AlertSink for FailingSink {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn alert(&self, _: &Notification) -> Result<(), AlertError> {
            Err(AlertError::Unavailable("no display".into()))
        }
    }

    #[tokio::test]
    async fn test_failing_system_sink_keeps_banner() {
        let mut notifier = Notifier::new(
            BannerBoard::new(StdDuration::from_secs(5)),
            Some(Arc::new(FailingSink)),
        );
        notifier.deliver(note("a", "P0"), now());
        tokio::task::yield_now().await;
        assert_eq!(notifier.banners.active(now()).len(), 1);
    }
}
