//! Execution poller: fetches the authoritative execution list on an interval
//! and on demand.
//!
//! Every cycle yields a complete list. An empty backend yields the example
//! set; a failed fetch yields the last live list marked stale, or the example
//! set marked as a fallback when there has never been a live list.

use crate::client::ExecutionFetcher;
use crate::state::{DashboardMessage, DataSource, PollOutcome};
use chrono::{DateTime, Utc};
use crisis_common::{example_executions, normalize_payload, Execution};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

pub struct Poller {
    fetcher: Arc<dyn ExecutionFetcher>,
    page_size: usize,
    last_live: Option<Vec<Execution>>,
    /// First observation time per id, so records without timestamps keep
    /// their place across cycles
    observed: HashMap<String, DateTime<Utc>>,
}

impl Poller {
    pub fn new(fetcher: Arc<dyn ExecutionFetcher>, page_size: usize) -> Self {
        Self {
            fetcher,
            page_size,
            last_live: None,
            observed: HashMap::new(),
        }
    }

    /// One fetch-and-normalize cycle. Never fails.
    pub async fn poll_once(&mut self, now: DateTime<Utc>) -> PollOutcome {
        match self.fetcher.fetch_executions(self.page_size).await {
            Ok(payload) => {
                let mut executions = normalize_payload(&payload, now);
                if executions.is_empty() {
                    debug!("Backend returned no executions, showing example data");
                    self.last_live = None;
                    return PollOutcome {
                        executions: example_executions(now),
                        source: DataSource::Example,
                        warning: None,
                        polled_at: now,
                    };
                }

                self.carry_observed(&mut executions);
                self.last_live = Some(executions.clone());
                PollOutcome {
                    executions,
                    source: DataSource::Live,
                    warning: None,
                    polled_at: now,
                }
            }
            Err(e) => {
                let warning = format!("Could not fetch executions: {}", e);
                warn!("{}", warning);
                match &self.last_live {
                    Some(live) => PollOutcome {
                        executions: live.clone(),
                        source: DataSource::Stale,
                        warning: Some(warning),
                        polled_at: now,
                    },
                    None => PollOutcome {
                        executions: example_executions(now),
                        source: DataSource::Fallback,
                        warning: Some(warning),
                        polled_at: now,
                    },
                }
            }
        }
    }

    fn carry_observed(&mut self, executions: &mut [Execution]) {
        let mut next = HashMap::with_capacity(executions.len());
        for exec in executions.iter_mut() {
            if let Some(first) = self.observed.get(&exec.id) {
                exec.observed_at = *first;
            }
            next.insert(exec.id.clone(), exec.observed_at);
        }
        self.observed = next;
    }

    /// Poll on `interval` and whenever `refresh` fires, until the queue closes
    pub async fn run(
        mut self,
        interval: Duration,
        tx: mpsc::Sender<DashboardMessage>,
        mut refresh: mpsc::Receiver<()>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("Poller started, every {:?}", interval);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                Some(()) = refresh.recv() => {
                    debug!("On-demand refresh");
                }
            }

            let outcome = self.poll_once(Utc::now()).await;
            if tx.send(DashboardMessage::Poll(outcome)).await.is_err() {
                debug!("Dashboard queue closed, poller stopping");
                return;
            }
        }
    }
}
