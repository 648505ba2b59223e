//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// calbridge - Google Calendar from the terminal
#[derive(Debug, Parser)]
#[command(name = "calbridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "CALBRIDGE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v', global = true)]
    pub debug: bool,

    /// OAuth client ID (from Google Cloud Console)
    #[arg(long, env = "GOOGLE_CLIENT_ID", global = true, hide_env_values = true)]
    pub client_id: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sign in, sign out, or show the session
    Auth {
        #[command(subcommand)]
        action: AuthAction,
    },

    /// List calendars
    Calendars,

    /// List events
    Events(EventsArgs),

    /// Create, replace or delete an event
    Event {
        #[command(subcommand)]
        action: EventAction,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Session actions.
#[derive(Debug, Subcommand)]
pub enum AuthAction {
    /// Sign in with Google
    Login {
        /// Sign in again even if a session exists
        #[arg(long, short)]
        force: bool,
    },

    /// Revoke the token and clear the session
    Logout,

    /// Show the current session
    Status,
}

/// Which events to list.
#[derive(Debug, Args)]
pub struct EventsArgs {
    /// Calendar ID (defaults to the configured calendar)
    #[arg(long)]
    pub calendar: Option<String>,

    /// Only today's events
    #[arg(long, conflicts_with_all = ["month", "from", "to"])]
    pub today: bool,

    /// Only this month's events
    #[arg(long, conflicts_with_all = ["from", "to"])]
    pub month: bool,

    /// Lower bound (RFC3339 or YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Upper bound (RFC3339 or YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Event mutations.
#[derive(Debug, Subcommand)]
pub enum EventAction {
    /// Create an event
    Create(EventFields),

    /// Change an event; fields not given keep their current values
    Update {
        /// Event ID
        id: String,

        #[command(flatten)]
        changes: EventChanges,
    },

    /// Delete an event
    Delete {
        /// Event ID
        id: String,

        /// Calendar ID (defaults to the configured calendar)
        #[arg(long)]
        calendar: Option<String>,
    },
}

/// Fields of an event to create or replace.
#[derive(Debug, Args)]
pub struct EventFields {
    /// Calendar ID (defaults to the configured calendar)
    #[arg(long)]
    pub calendar: Option<String>,

    /// Event title
    #[arg(long)]
    pub title: Option<String>,

    /// Start (RFC3339 or YYYY-MM-DD)
    #[arg(long)]
    pub start: String,

    /// End (RFC3339 or YYYY-MM-DD)
    #[arg(long)]
    pub end: String,

    /// Make it an all-day event
    #[arg(long)]
    pub all_day: bool,

    /// Event description
    #[arg(long)]
    pub description: Option<String>,

    /// Event location
    #[arg(long)]
    pub location: Option<String>,

    /// Color key, 1 to 11
    #[arg(long)]
    pub color: Option<String>,

    /// Output the stored event as JSON
    #[arg(long)]
    pub json: bool,
}

/// Fields to change on an existing event.
#[derive(Debug, Args)]
pub struct EventChanges {
    /// Calendar ID (defaults to the configured calendar)
    #[arg(long)]
    pub calendar: Option<String>,

    /// New title
    #[arg(long)]
    pub title: Option<String>,

    /// New start (RFC3339 or YYYY-MM-DD)
    #[arg(long)]
    pub start: Option<String>,

    /// New end (RFC3339 or YYYY-MM-DD)
    #[arg(long)]
    pub end: Option<String>,

    /// Treat the new start and end as all-day
    #[arg(long)]
    pub all_day: bool,

    /// New description
    #[arg(long)]
    pub description: Option<String>,

    /// New location
    #[arg(long)]
    pub location: Option<String>,

    /// New color key, 1 to 11
    #[arg(long)]
    pub color: Option<String>,

    /// Output the stored event as JSON
    #[arg(long)]
    pub json: bool,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Validate configuration
    Validate,

    /// Show configuration file path
    Path,
}
