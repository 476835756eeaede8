//! crisisd library - exposes modules for testing.

pub mod auth;
pub mod error;
pub mod hub;
pub mod ingest;
pub mod routes;
pub mod server;
pub mod skills;
pub mod upstream;

pub use server::{build_router, AppState};
