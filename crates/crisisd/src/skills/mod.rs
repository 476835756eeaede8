//! Skill stub gateway: the tool endpoints the orchestration platform calls.
//!
//! Every handler is a thin request/response stub. Side effects are limited
//! to push events and the in-memory ingest store.

pub mod events;
pub mod kb;
pub mod ops;
pub mod social;
pub mod tickets;

use crate::auth::require_tool_key;
use crate::server::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

/// Skill routes, all behind the tool-key check
pub fn skill_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/skills/create-ticket", post(tickets::create_ticket))
        .route("/api/skills/post-social", post(social::post_social))
        .route("/api/skills/social-monitor", get(social::social_monitor))
        .route("/api/skills/notify-ops", post(ops::notify_ops))
        .route("/api/skills/human-approval", post(ops::human_approval))
        .route("/api/skills/kb-search", get(kb::kb_search))
        .route("/api/skills/ingest-event", post(events::ingest_event))
        .route_layer(middleware::from_fn_with_state(state, require_tool_key))
}

/// `PREFIX-` followed by 8 random hex digits, e.g. `TICK-9f2c01ab`
pub fn short_id(prefix: &str) -> String {
    let bytes: [u8; 4] = rand::random();
    format!("{}-{}", prefix, hex::encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_shape() {
        let id = short_id("TICK");
        let (prefix, hex_part) = id.split_once('-').unwrap();
        assert_eq!(prefix, "TICK");
        assert_eq!(hex_part.len(), 8);
        assert!(hex_part.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(short_id("TICK"), short_id("TICK"));
    }
}
