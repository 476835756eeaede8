//! Push hub: fans live events out to every connected dashboard.
//!
//! Subscribers receive newline-delimited JSON frames over a long-lived HTTP
//! response. A subscriber that falls behind loses the oldest frames; the
//! producer never waits.

use crate::error::ApiError;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::Response,
};
use crisis_common::{EventType, PushFrame};
use serde_json::Value;
use std::convert::Infallible;
use tokio::sync::broadcast;
use tokio_stream::wrappers::{errors::BroadcastStreamRecvError, BroadcastStream};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

pub struct EventHub {
    tx: broadcast::Sender<PushFrame>,
    enabled: bool,
}

impl EventHub {
    pub fn new(capacity: usize, enabled: bool) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx, enabled }
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Log and broadcast one event. Always logged, even with no subscribers
    /// or with the channel disabled.
    pub fn emit(&self, event_type: EventType, data: Value) {
        info!("[Event] {}: {}", event_type, data);
        if !self.enabled {
            return;
        }
        match self.tx.send(PushFrame::new(event_type, data)) {
            Ok(n) => debug!("{} delivered to {} subscribers", event_type, n),
            Err(_) => debug!("{} dropped, no subscribers", event_type),
        }
    }

    pub fn subscribe(&self) -> Result<broadcast::Receiver<PushFrame>, ApiError> {
        if !self.enabled {
            return Err(ApiError::ChannelDisabled);
        }
        Ok(self.tx.subscribe())
    }

    /// Streaming NDJSON response for one subscriber
    pub fn stream_response(&self) -> Result<Response, ApiError> {
        let rx = self.subscribe()?;
        info!("Push subscriber connected ({} total)", self.subscriber_count());

        let lines = BroadcastStream::new(rx).filter_map(|frame| match frame {
            Ok(frame) => Some(Ok::<_, Infallible>(frame.to_line())),
            Err(BroadcastStreamRecvError::Lagged(n)) => {
                warn!("Push subscriber lagged, skipped {} frames", n);
                None
            }
        });

        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
            .header(header::CACHE_CONTROL, "no-cache")
            .body(Body::from_stream(lines))
            .map_err(|e| ApiError::BadRequest(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_emit_reaches_subscribers() {
        let hub = EventHub::new(8, true);
        let mut a = hub.subscribe().unwrap();
        let mut b = hub.subscribe().unwrap();

        hub.emit(EventType::NewEvent, json!({"eventId": "EVT-1"}));

        for rx in [&mut a, &mut b] {
            let frame = rx.recv().await.unwrap();
            assert_eq!(frame.event_type(), Some(EventType::NewEvent));
            assert_eq!(frame.data["eventId"], "EVT-1");
        }
    }

    #[test]
    fn test_emit_without_subscribers_is_fine() {
        let hub = EventHub::new(8, true);
        hub.emit(EventType::FlowUpdate, json!({}));
        assert_eq!(hub.subscriber_count(), 0);
    }

    #[test]
    fn test_disabled_hub_refuses_subscribers() {
        let hub = EventHub::new(8, false);
        assert!(matches!(hub.subscribe(), Err(ApiError::ChannelDisabled)));
        hub.emit(EventType::FlowUpdate, json!({}));
    }

    #[tokio::test]
    async fn test_slow_subscriber_lags_instead_of_blocking() {
        let hub = EventHub::new(2, true);
        let mut rx = hub.subscribe().unwrap();
        for i in 0..5 {
            hub.emit(EventType::FlowUpdate, json!({"n": i}));
        }
        assert!(matches!(
            rx.recv().await,
            Err(broadcast::error::RecvError::Lagged(3))
        ));
        assert_eq!(rx.recv().await.unwrap().data["n"], 3);
    }
}
