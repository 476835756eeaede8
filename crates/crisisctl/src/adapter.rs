//! Event source adapter over the best-effort push channel.
//!
//! The channel is an NDJSON stream at `/api/events/stream`. It may be refused
//! (serverless backends answer 404/501/503), time out, or drop mid-stream.
//! None of that escapes: the adapter flips its alive flag to false, retries a
//! bounded number of times, then goes quiet and leaves the dashboard on
//! polling alone.

use crate::client::{ApiClient, ClientError};
use crate::state::DashboardMessage;
use chrono::Utc;
use crisis_common::config::DashboardConfig;
use crisis_common::{EventRecord, PushFrame};
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Statuses meaning the backend has no push channel at all
const UNSUPPORTED_STATUSES: &[u16] = &[404, 501, 503];

#[derive(Debug, Clone)]
pub struct AdapterSettings {
    pub connect_timeout: Duration,
    /// Reconnects allowed per session, on top of the first connect
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
}

impl From<&DashboardConfig> for AdapterSettings {
    fn from(config: &DashboardConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            reconnect_attempts: config.reconnect_attempts,
            reconnect_delay: config.reconnect_delay(),
        }
    }
}

/// How one connection ended
enum SessionEnd {
    /// Could not connect, or the stream broke; worth another try
    Retry,
    /// Backend has no push channel
    Unsupported,
    /// Nobody is listening any more
    QueueClosed,
}

/// Handle to a running adapter task. Dropping it does not stop the task;
/// `close` does.
pub struct EventSourceAdapter {
    alive: Arc<AtomicBool>,
    attempts: Arc<AtomicU32>,
    task: Option<JoinHandle<()>>,
}

impl EventSourceAdapter {
    /// Start the adapter. Recognized events go to `tx` as `PushEvent`,
    /// liveness changes as `ChannelState`.
    pub fn spawn(
        client: ApiClient,
        settings: AdapterSettings,
        tx: mpsc::Sender<DashboardMessage>,
    ) -> Self {
        let alive = Arc::new(AtomicBool::new(false));
        let attempts = Arc::new(AtomicU32::new(0));

        let worker = Worker {
            client,
            settings,
            tx,
            alive: Arc::clone(&alive),
            attempts: Arc::clone(&attempts),
        };
        let task = tokio::spawn(worker.run());

        Self {
            alive,
            attempts,
            task: Some(task),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Connection attempts made so far, first connect included
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    pub fn is_finished(&self) -> bool {
        self.task.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Wait for the adapter to give up on its own
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!("Event adapter task failed: {}", e);
                }
            }
        }
    }

    /// Stop the adapter. Safe to call more than once.
    pub fn close(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
            debug!("Event adapter closed");
        }
        self.alive.store(false, Ordering::SeqCst);
    }
}

impl Drop for EventSourceAdapter {
    fn drop(&mut self) {
        self.close();
    }
}

struct Worker {
    client: ApiClient,
    settings: AdapterSettings,
    tx: mpsc::Sender<DashboardMessage>,
    alive: Arc<AtomicBool>,
    attempts: Arc<AtomicU32>,
}

impl Worker {
    async fn run(self) {
        let max_attempts = self.settings.reconnect_attempts.saturating_add(1);

        loop {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            debug!("Push channel connect attempt {}/{}", attempt, max_attempts);

            match self.session().await {
                SessionEnd::Retry => {}
                SessionEnd::Unsupported | SessionEnd::QueueClosed => break,
            }

            if attempt >= max_attempts {
                info!("Push channel gave up after {} attempts, polling only", attempt);
                break;
            }
            tokio::time::sleep(self.settings.reconnect_delay).await;
        }

        self.set_alive(false).await;
    }

    async fn set_alive(&self, alive: bool) {
        let was = self.alive.swap(alive, Ordering::SeqCst);
        if was != alive {
            let _ = self.tx.send(DashboardMessage::ChannelState { alive }).await;
        }
    }

    /// One connection, read until it ends
    async fn session(&self) -> SessionEnd {
        let connect = tokio::time::timeout(
            self.settings.connect_timeout,
            self.client.open_event_stream(),
        )
        .await
        .unwrap_or(Err(ClientError::Timeout(self.settings.connect_timeout)));

        let resp = match connect {
            Ok(resp) => resp,
            Err(e) => {
                if e.status_code()
                    .is_some_and(|s| UNSUPPORTED_STATUSES.contains(&s))
                {
                    info!("Backend has no push channel ({}), polling only", e);
                    return SessionEnd::Unsupported;
                }
                debug!("Push channel connect failed: {}", e);
                return SessionEnd::Retry;
            }
        };

        self.set_alive(true).await;
        info!("Push channel connected to {}", self.client.base_url());

        let mut stream = resp.bytes_stream();
        // Raw bytes: a chunk may end inside a multi-byte character
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(chunk) = stream.next().await {
            let bytes = match chunk {
                Ok(b) => b,
                Err(e) => {
                    debug!("Push channel read error: {}", e);
                    break;
                }
            };
            buffer.extend_from_slice(&bytes);

            while let Some(pos) = buffer.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = buffer.drain(..=pos).collect();
                let Some(event) = parse_line(&line) else {
                    continue;
                };
                if self.tx.send(DashboardMessage::PushEvent(event)).await.is_err() {
                    return SessionEnd::QueueClosed;
                }
            }
        }

        self.set_alive(false).await;
        SessionEnd::Retry
    }
}

/// Decode one NDJSON line into an event record stamped with the arrival
/// time. Blank lines, malformed JSON and unknown event types give None.
pub fn parse_line(line: &[u8]) -> Option<EventRecord> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return None;
    }
    let frame: PushFrame = match serde_json::from_slice(line) {
        Ok(f) => f,
        Err(e) => {
            debug!("Skipping malformed push line: {}", e);
            return None;
        }
    };
    match frame.event_type() {
        Some(t) => Some(EventRecord::new(t, frame.data, Utc::now())),
        None => {
            debug!("Skipping unknown push event type '{}'", frame.event);
            None
        }
    }
}
