//! crisisctl library: backend client, polling, push channel adapter, crisis
//! reconciliation, notifications and terminal rendering.

pub mod adapter;
pub mod client;
pub mod dashboard;
pub mod notify;
pub mod poller;
pub mod reconciler;
pub mod render;
pub mod state;

pub use client::{ApiClient, ClientError, ExecutionFetcher};
pub use dashboard::{Dashboard, DashboardOptions};
pub use state::{DashboardMessage, DashboardSnapshot, DataSource};
