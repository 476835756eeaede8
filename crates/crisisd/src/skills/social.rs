//! PostSocial and SocialMonitor stubs.

use super::short_id;
use axum::{extract::Query, Json};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PostSocialRequest {
    pub channel: Option<String>,
    pub message: Option<String>,
    pub in_reply_to_id: Option<String>,
    pub dry_run: bool,
}

pub fn post(req: PostSocialRequest) -> Value {
    let message = req.message.unwrap_or_default();
    let channel = req.channel.unwrap_or_default();

    if req.dry_run {
        info!("[PostSocial] DRY RUN - Channel: {}, Message: {}", channel, message);
        return json!({
            "postId": null,
            "status": "dry-run",
            "message": format!("Would post: {}", message),
        });
    }

    let post_id = short_id("POST");
    info!("[PostSocial] Posted to {}: {}", channel, message);
    json!({
        "postId": post_id,
        "status": "posted",
        "channel": channel,
        "timestamp": Utc::now().to_rfc3339(),
    })
}

pub async fn post_social(Json(req): Json<PostSocialRequest>) -> Json<Value> {
    Json(post(req))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SocialMonitorQuery {
    pub platform: Option<String>,
    pub keywords: Option<String>,
    pub since: Option<String>,
}

/// Mock scan result; the query only shapes the echoed `platform`
pub fn monitor(query: SocialMonitorQuery) -> Value {
    let posts = vec![json!({
        "id": "TWEET-001",
        "text": "Is IBM Cloud down? can't access my bucket since 10:05",
        "platform": "twitter",
        "author": "@user123",
        "timestamp": Utc::now().to_rfc3339(),
        "retweets": 120,
        "mentions": ["#ibmclouddown"],
    })];

    info!(
        "[SocialMonitor] platform={} keywords={}",
        query.platform.as_deref().unwrap_or("all"),
        query.keywords.as_deref().unwrap_or("-")
    );

    json!({
        "count": posts.len(),
        "posts": posts,
        "platform": query.platform.unwrap_or_else(|| "all".to_string()),
    })
}

pub async fn social_monitor(Query(query): Query<SocialMonitorQuery>) -> Json<Value> {
    Json(monitor(query))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dry_run() {
        let resp = post(PostSocialRequest {
            channel: Some("twitter".into()),
            message: Some("We are investigating".into()),
            dry_run: true,
            ..Default::default()
        });
        assert!(resp["postId"].is_null());
        assert_eq!(resp["status"], "dry-run");
        assert_eq!(resp["message"], "Would post: We are investigating");
    }

    #[test]
    fn test_real_post() {
        let resp = post(PostSocialRequest {
            channel: Some("twitter".into()),
            message: Some("Fixed".into()),
            ..Default::default()
        });
        assert!(resp["postId"].as_str().unwrap().starts_with("POST-"));
        assert_eq!(resp["status"], "posted");
        assert_eq!(resp["channel"], "twitter");
    }

    #[test]
    fn test_monitor_defaults_platform() {
        let resp = monitor(SocialMonitorQuery::default());
        assert_eq!(resp["platform"], "all");
        assert_eq!(resp["count"], 1);
        assert_eq!(resp["posts"][0]["id"], "TWEET-001");
    }
}
