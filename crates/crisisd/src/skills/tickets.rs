//! CreateTicket stub.

use super::short_id;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

const TICKET_BASE_URL: &str = "https://demo.zendesk.com/tickets";

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateTicketRequest {
    pub customer: Option<Value>,
    pub title: Option<String>,
    pub text: Option<String>,
    pub priority: Option<String>,
    pub attachments: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTicketResponse {
    pub ticket_id: String,
    pub ticket_url: String,
    pub status: &'static str,
    pub priority: Option<String>,
    pub created_at: DateTime<Utc>,
}

pub fn create(req: CreateTicketRequest) -> CreateTicketResponse {
    let ticket_id = short_id("TICK");
    info!(
        "[CreateTicket] Priority: {}, Title: {}",
        req.priority.as_deref().unwrap_or("-"),
        req.title.as_deref().unwrap_or("-")
    );
    CreateTicketResponse {
        ticket_url: format!("{}/{}", TICKET_BASE_URL, ticket_id),
        ticket_id,
        status: "created",
        priority: req.priority,
        created_at: Utc::now(),
    }
}

pub async fn create_ticket(Json(req): Json<CreateTicketRequest>) -> Json<CreateTicketResponse> {
    Json(create(req))
}
