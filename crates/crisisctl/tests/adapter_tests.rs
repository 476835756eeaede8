//! Push channel adapter against real sockets
//!
//! Covers the unreachable backend, a backend without a push channel, and a
//! stream that mixes valid, unknown and malformed lines.

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use crisis_common::EventType;
use crisisctl::adapter::{AdapterSettings, EventSourceAdapter};
use crisisctl::client::ApiClient;
use crisisctl::state::DashboardMessage;
use futures_util::StreamExt;
use std::convert::Infallible;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

// ============================================================================
// Helpers
// ============================================================================

fn settings(reconnect_attempts: u32) -> AdapterSettings {
    AdapterSettings {
        connect_timeout: Duration::from_millis(500),
        reconnect_attempts,
        reconnect_delay: Duration::from_millis(10),
    }
}

/// Serve `app` on an ephemeral port and return its base URL
async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A port nothing listens on
async fn dead_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn drain(rx: &mut mpsc::Receiver<DashboardMessage>) -> Vec<DashboardMessage> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

async fn run_to_end(
    base_url: &str,
    settings: AdapterSettings,
) -> (EventSourceAdapter, Vec<DashboardMessage>) {
    let client = ApiClient::new(base_url, Duration::from_millis(500)).unwrap();
    let (tx, mut rx) = mpsc::channel(64);
    let mut adapter = EventSourceAdapter::spawn(client, settings, tx);

    tokio::time::timeout(Duration::from_secs(10), adapter.join())
        .await
        .expect("adapter should give up on its own");

    let messages = drain(&mut rx);
    (adapter, messages)
}

// ============================================================================
// Tests
// ============================================================================

/// Unreachable backend: 1 connect + 2 reconnects, then silence
#[tokio::test]
async fn test_unreachable_backend_uses_full_budget() {
    let url = dead_url().await;
    let (adapter, messages) = run_to_end(&url, settings(2)).await;

    assert!(!adapter.is_alive());
    assert_eq!(adapter.attempts(), 3);
    assert!(adapter.is_finished());
    assert!(!messages
        .iter()
        .any(|m| matches!(m, DashboardMessage::PushEvent(_))));
}

/// 404 means no push channel: stop after the first attempt
#[tokio::test]
async fn test_missing_endpoint_is_not_retried() {
    let app = Router::new().route(
        "/health",
        get(|| async { "ok" }),
    );
    let url = serve(app).await;
    let (adapter, messages) = run_to_end(&url, settings(3)).await;

    assert!(!adapter.is_alive());
    assert_eq!(adapter.attempts(), 1);
    assert!(messages.is_empty());
}

/// 503 from a backend that disabled the channel behaves the same way
#[tokio::test]
async fn test_disabled_channel_is_not_retried() {
    let app = Router::new().route(
        "/api/events/stream",
        get(|| async { StatusCode::SERVICE_UNAVAILABLE }),
    );
    let url = serve(app).await;
    let (adapter, _) = run_to_end(&url, settings(3)).await;
    assert_eq!(adapter.attempts(), 1);
}

/// Only recognized event types reach the queue, in order
#[tokio::test]
async fn test_stream_skips_malformed_and_unknown_lines() {
    let body = concat!(
        "{\"event\":\"flowUpdate\",\"data\":{\"status\":\"running\"}}\n",
        "not json at all\n",
        "{\"event\":\"mystery\",\"data\":{}}\n",
        "\n",
        "{\"event\":\"opsNotification\",\"data\":{\"priority\":\"P0\"}}\n",
    );
    let app = Router::new().route(
        "/api/events/stream",
        get(move || async move {
            ([(header::CONTENT_TYPE, "application/x-ndjson")], body).into_response()
        }),
    );
    let url = serve(app).await;
    let (adapter, messages) = run_to_end(&url, settings(0)).await;

    let events: Vec<_> = messages
        .iter()
        .filter_map(|m| match m {
            DashboardMessage::PushEvent(e) => Some(e),
            _ => None,
        })
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].event_type, EventType::FlowUpdate);
    assert_eq!(events[1].event_type, EventType::OpsNotification);
    assert_eq!(events[1].data["priority"], "P0");

    // Connected, then dropped when the body ended
    let states: Vec<bool> = messages
        .iter()
        .filter_map(|m| match m {
            DashboardMessage::ChannelState { alive } => Some(*alive),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec![true, false]);
    assert!(!adapter.is_alive());
}

/// A character split across two network chunks arrives intact
#[tokio::test]
async fn test_multibyte_text_split_across_chunks() {
    let line = "{\"event\":\"flowUpdate\",\"data\":{\"text\":\"café down\"}}\n";
    let split = line.find('é').unwrap() + 1;
    let first = line.as_bytes()[..split].to_vec();
    let second = line.as_bytes()[split..].to_vec();

    let app = Router::new().route(
        "/api/events/stream",
        get(move || {
            let chunks = futures_util::stream::iter(vec![(first.clone(), 0u64), (second.clone(), 200)])
                .then(|(chunk, delay_ms)| async move {
                    tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                    Ok::<_, Infallible>(chunk)
                });
            async move {
                (
                    [(header::CONTENT_TYPE, "application/x-ndjson")],
                    Body::from_stream(chunks),
                )
                    .into_response()
            }
        }),
    );
    let url = serve(app).await;
    let (_, messages) = run_to_end(&url, settings(0)).await;

    let texts: Vec<String> = messages
        .iter()
        .filter_map(|m| match m {
            DashboardMessage::PushEvent(e) => e.data["text"].as_str().map(str::to_string),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["café down".to_string()]);
}

/// close() stops a live adapter and can be repeated
#[tokio::test]
async fn test_close_is_idempotent() {
    let url = dead_url().await;
    let client = ApiClient::new(&url, Duration::from_millis(500)).unwrap();
    let (tx, _rx) = mpsc::channel(8);
    let mut adapter = EventSourceAdapter::spawn(
        client,
        AdapterSettings {
            connect_timeout: Duration::from_millis(500),
            reconnect_attempts: 100,
            reconnect_delay: Duration::from_secs(60),
        },
        tx,
    );
    adapter.close();
    adapter.close();
    assert!(!adapter.is_alive());
    assert!(adapter.is_finished());
}
