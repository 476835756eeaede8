//! Dashboard runtime.
//!
//! The poller task and the event adapter write `DashboardMessage`s into one
//! queue. A single consumer task owns `DashboardState`, applies each message
//! (reconciling crises after every poll) and publishes a fresh immutable
//! snapshot through a `watch` channel. Readers only ever see whole snapshots.

use crate::adapter::{AdapterSettings, EventSourceAdapter};
use crate::client::{ApiClient, ExecutionFetcher};
use crate::notify::{AlertSink, BannerBoard, Notifier};
use crate::poller::Poller;
use crate::state::{DashboardMessage, DashboardSnapshot, DashboardState};
use chrono::Utc;
use crisis_common::config::DashboardConfig;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

const QUEUE_CAPACITY: usize = 256;

/// Banner expiry check cadence
const HOUSEKEEPING_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct DashboardOptions {
    pub poll_interval: Duration,
    pub page_size: usize,
    pub banner_ttl: Duration,
    pub adapter: AdapterSettings,
}

impl From<&DashboardConfig> for DashboardOptions {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            poll_interval: config.poll_interval(),
            page_size: config.page_size,
            banner_ttl: config.banner_ttl(),
            adapter: AdapterSettings::from(config),
        }
    }
}

pub struct Dashboard {
    snapshots: watch::Receiver<Arc<DashboardSnapshot>>,
    queue: mpsc::Sender<DashboardMessage>,
    refresh: mpsc::Sender<()>,
    adapter: Option<EventSourceAdapter>,
    poller: Option<JoinHandle<()>>,
    consumer: Option<JoinHandle<()>>,
}

impl Dashboard {
    /// Start polling through `fetcher`, and listening on the push channel
    /// when `push` is given.
    pub fn start(
        fetcher: Arc<dyn ExecutionFetcher>,
        push: Option<ApiClient>,
        options: DashboardOptions,
        system_sink: Option<Arc<dyn AlertSink>>,
    ) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(QUEUE_CAPACITY);
        let (refresh_tx, refresh_rx) = mpsc::channel(4);

        let notifier = Notifier::new(BannerBoard::new(options.banner_ttl), system_sink);
        let state = DashboardState::new(notifier);
        let (snap_tx, snap_rx) = watch::channel(Arc::new(state.snapshot(Utc::now())));

        let consumer = tokio::spawn(consume(state, queue_rx, snap_tx));

        let poller = Poller::new(fetcher, options.page_size);
        let poller = tokio::spawn(poller.run(options.poll_interval, queue_tx.clone(), refresh_rx));

        let adapter = push.map(|client| {
            EventSourceAdapter::spawn(client, options.adapter.clone(), queue_tx.clone())
        });

        info!(
            "Dashboard started (poll every {:?}, push channel {})",
            options.poll_interval,
            if adapter.is_some() { "on" } else { "off" }
        );

        Self {
            snapshots: snap_rx,
            queue: queue_tx,
            refresh: refresh_tx,
            adapter,
            poller: Some(poller),
            consumer: Some(consumer),
        }
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<DashboardSnapshot> {
        Arc::clone(&*self.snapshots.borrow())
    }

    /// Receiver that wakes on every new snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<DashboardSnapshot>> {
        self.snapshots.clone()
    }

    /// Ask the poller for an immediate cycle
    pub async fn refresh(&self) {
        let _ = self.refresh.send(()).await;
    }

    pub async fn dismiss_banner(&self, id: &str) {
        let _ = self
            .queue
            .send(DashboardMessage::DismissBanner(id.to_string()))
            .await;
    }

    pub async fn clear_banners(&self) {
        let _ = self.queue.send(DashboardMessage::ClearBanners).await;
    }

    pub fn channel_alive(&self) -> bool {
        self.adapter.as_ref().is_some_and(|a| a.is_alive())
    }

    /// Stop every task. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(mut adapter) = self.adapter.take() {
            adapter.close();
        }
        for task in [self.poller.take(), self.consumer.take()].into_iter().flatten() {
            task.abort();
        }
        debug!("Dashboard shut down");
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn consume(
    mut state: DashboardState,
    mut queue: mpsc::Receiver<DashboardMessage>,
    snapshots: watch::Sender<Arc<DashboardSnapshot>>,
) {
    let mut housekeeping = tokio::time::interval(HOUSEKEEPING_INTERVAL);

    loop {
        tokio::select! {
            msg = queue.recv() => {
                let Some(msg) = msg else { break };
                let now = Utc::now();
                state.apply(msg, now);
                snapshots.send_replace(Arc::new(state.snapshot(now)));
            }
            _ = housekeeping.tick() => {
                let now = Utc::now();
                let expired = snapshots
                    .borrow()
                    .banners
                    .iter()
                    .any(|b| b.expires_at <= now);
                if expired {
                    snapshots.send_replace(Arc::new(state.snapshot(now)));
                }
            }
        }
    }
    debug!("Dashboard queue closed");
}
