//! Command-line definitions for crisisctl.

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "crisisctl")]
#[command(about = "Crisis Monitor - dashboard for crisis-handling flows", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Backend URL (overrides config and CRISIS_BACKEND_URL)
    #[arg(long, global = true)]
    pub backend: Option<String>,

    /// Print JSON instead of formatted text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check backend health
    Health,

    /// Show summary statistics
    Stats,

    /// List executions, or show one
    Executions {
        /// Only show executions with this status
        #[arg(long)]
        status: Option<String>,

        /// Show the full input and output of one execution
        #[arg(long)]
        id: Option<String>,
    },

    /// Show active crises, highest priority first
    Crises,

    /// Show the event log
    Events {
        /// Only show this event type (flowUpdate, newEvent, opsNotification, humanApproval)
        #[arg(long = "type")]
        event_type: Option<String>,

        /// Case-insensitive search over event data
        #[arg(long, default_value = "")]
        search: String,
    },

    /// Live dashboard: polls, listens on the push channel, alerts on new crises
    Watch {
        /// Poll interval in seconds (overrides config)
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Trigger the crisis flow with a message
    Trigger {
        /// Crisis message text
        #[arg(long)]
        text: String,

        /// Channel the message arrived on
        #[arg(long, default_value = "twitter")]
        channel: String,
    },
}
