//! crisisctl - crisis monitor dashboard
//!
//! One-shot views of the backend's executions, crises and events, plus a
//! live `watch` mode with new-crisis alerts.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use crisis_common::CrisisConfig;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so --json output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut config = CrisisConfig::load();
    if let Some(url) = cli.backend {
        config.dashboard.backend_url = url;
    }
    config.validate()?;
    let dash = &config.dashboard;
    let json = cli.json;

    match cli.command.unwrap_or(Commands::Watch { interval: None }) {
        Commands::Health => commands::health(dash, json).await,
        Commands::Stats => commands::stats(dash, json).await,
        Commands::Executions { status, id } => commands::executions(dash, status, id, json).await,
        Commands::Crises => commands::crises(dash, json).await,
        Commands::Events { event_type, search } => {
            commands::events(dash, event_type, search, json).await
        }
        Commands::Watch { interval } => commands::watch(dash, interval, json).await,
        Commands::Trigger { text, channel } => commands::trigger(dash, &text, &channel, json).await,
    }
}
