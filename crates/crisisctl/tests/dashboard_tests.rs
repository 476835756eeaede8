//! End-to-end dashboard runs against a local HTTP backend

use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use crisis_common::EventFilter;
use crisisctl::adapter::AdapterSettings;
use crisisctl::client::ApiClient;
use crisisctl::dashboard::{Dashboard, DashboardOptions};
use crisisctl::state::{DashboardSnapshot, DataSource};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

async fn serve(app: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn options() -> DashboardOptions {
    DashboardOptions {
        poll_interval: Duration::from_millis(50),
        page_size: 50,
        banner_ttl: Duration::from_secs(5),
        adapter: AdapterSettings {
            connect_timeout: Duration::from_millis(500),
            reconnect_attempts: 0,
            reconnect_delay: Duration::from_millis(10),
        },
    }
}

/// Wait until a snapshot satisfies `pred`
async fn wait_for(
    dash: &Dashboard,
    pred: impl Fn(&DashboardSnapshot) -> bool,
) -> Arc<DashboardSnapshot> {
    let mut rx = dash.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let snap = rx.borrow_and_update().clone();
            if pred(&snap) {
                return snap;
            }
            rx.changed().await.unwrap();
        }
    })
    .await
    .expect("snapshot condition not reached")
}

/// Live executions plus pushed events, one alert per crisis
#[tokio::test]
async fn test_live_backend_with_push_channel() {
    let app = Router::new()
        .route(
            "/api/executions",
            get(|| async {
                Json(json!({"executions": [
                    {"id": "exec-1", "status": "running", "flow_name": "crisis_flow",
                     "input": {"text": "Checkout is down for everyone", "channel": "twitter"}},
                    {"id": "exec-2", "status": "completed",
                     "input": {"text": "thanks for the quick fix"},
                     "output": {"ticket_created": true}}
                ], "total": 2}))
            }),
        )
        .route(
            "/api/events/stream",
            get(|| async {
                (
                    [(header::CONTENT_TYPE, "application/x-ndjson")],
                    "{\"event\":\"humanApproval\",\"data\":{\"request_id\":\"apr-1\"}}\n",
                )
                    .into_response()
            }),
        );
    let url = serve(app).await;
    let api = ApiClient::new(&url, Duration::from_millis(500)).unwrap();

    let mut dash = Dashboard::start(Arc::new(api.clone()), Some(api), options(), None);

    let snap = wait_for(&dash, |s| {
        s.source == DataSource::Live && !s.events.is_empty()
    })
    .await;

    assert_eq!(snap.executions.len(), 2);
    assert_eq!(snap.events[0].data["request_id"], "apr-1");

    let view = snap.view(&EventFilter::default());
    assert_eq!(view.crises.len(), 1);
    assert_eq!(view.crises[0].id, "exec-1");
    assert_eq!(view.stats.tickets_created, 1);
    // one pushed event plus one per execution
    assert_eq!(view.events.total, 3);

    // Several more polls; the crisis is not announced again
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(dash.snapshot().notifications_sent, 1);

    dash.shutdown();
}

/// Backend errors before any live data: example set, warning, no push
#[tokio::test]
async fn test_failing_backend_falls_back_to_examples() {
    let app = Router::new().route(
        "/api/executions",
        get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "boom") }),
    );
    let url = serve(app).await;
    let api = ApiClient::new(&url, Duration::from_millis(500)).unwrap();

    let mut dash = Dashboard::start(Arc::new(api.clone()), Some(api), options(), None);
    let snap = wait_for(&dash, |s| s.source != DataSource::Pending).await;

    assert_eq!(snap.source, DataSource::Fallback);
    assert!(snap.warning.as_deref().unwrap_or("").contains("500"));
    assert!(snap.executions.iter().all(|e| e.example));
    assert!(!dash.channel_alive());

    dash.shutdown();
}

/// Manual refresh triggers a poll well before the interval
#[tokio::test]
async fn test_refresh_polls_immediately() {
    let app = Router::new().route(
        "/api/executions",
        get(|| async { Json(json!([])) }),
    );
    let url = serve(app).await;
    let api = ApiClient::new(&url, Duration::from_millis(500)).unwrap();

    let mut opts = options();
    opts.poll_interval = Duration::from_secs(3600);
    let mut dash = Dashboard::start(Arc::new(api), None, opts, None);

    // First tick fires immediately
    let first = wait_for(&dash, |s| s.last_poll.is_some()).await;
    assert_eq!(first.source, DataSource::Example);

    dash.refresh().await;
    let second = wait_for(&dash, |s| s.last_poll > first.last_poll).await;
    assert_eq!(second.source, DataSource::Example);

    dash.shutdown();
}

/// Banners are dismissed one at a time by id, or cleared together
#[tokio::test]
async fn test_dismiss_and_clear_banners() {
    let app = Router::new().route(
        "/api/executions",
        get(|| async {
            Json(json!([
                {"id": "exec-1", "status": "running",
                 "input": {"text": "Payments are down"}, "output": {"priority": "P0"}},
                {"id": "exec-2", "status": "running",
                 "input": {"text": "critical security breach"}, "output": {"priority": "P1"}}
            ]))
        }),
    );
    let url = serve(app).await;
    let api = ApiClient::new(&url, Duration::from_millis(500)).unwrap();

    let mut dash = Dashboard::start(Arc::new(api), None, options(), None);
    let snap = wait_for(&dash, |s| s.banners.len() == 2).await;

    let gone = snap.banners[0].notification.id.clone();
    dash.dismiss_banner(&gone).await;
    let snap = wait_for(&dash, |s| s.banners.len() == 1).await;
    assert_ne!(snap.banners[0].notification.id, gone);

    dash.clear_banners().await;
    let snap = wait_for(&dash, |s| s.banners.is_empty()).await;
    assert_eq!(snap.notifications_sent, 2);

    dash.shutdown();
}
