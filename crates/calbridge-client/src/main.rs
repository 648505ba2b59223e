//! calbridge CLI entry point.

use std::process::ExitCode;

use calbridge_core::{TracingConfig, init_tracing};
use clap::{CommandFactory, Parser};

use calbridge_client::cli::{AuthAction, Cli, Command, ConfigAction, EventAction};
use calbridge_client::commands::{self, Context};
use calbridge_client::config::ClientConfig;
use calbridge_client::error::{ClientError, ClientResult};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.config {
        Some(ref path) => ClientConfig::load_from(path),
        None => ClientConfig::load(),
    };
    let debug = cli.debug || config.as_ref().is_ok_and(|c| c.debug);
    if let Err(e) = init_tracing(TracingConfig::cli().with_debug(debug)) {
        eprintln!("warning: {}", e);
    }

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(ClientError::Config(e)),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run(cli: Cli, config: ClientConfig) -> ClientResult<()> {
    let config_path = cli.config.unwrap_or_else(ClientConfig::default_path);
    let ctx = Context::new(config, cli.client_id).with_config_path(config_path);

    match cli.command {
        Some(Command::Auth { action }) => match action {
            AuthAction::Login { force } => commands::auth::login(&ctx, force).await,
            AuthAction::Logout => commands::auth::logout(&ctx).await,
            AuthAction::Status => commands::auth::status(&ctx),
        },
        Some(Command::Calendars) => commands::calendars::list(&ctx).await,
        Some(Command::Events(args)) => commands::events::list(&ctx, args).await,
        Some(Command::Event { action }) => match action {
            EventAction::Create(fields) => commands::events::create(&ctx, fields).await,
            EventAction::Update { id, changes } => {
                commands::events::update(&ctx, id, changes).await
            }
            EventAction::Delete { id, calendar } => {
                commands::events::delete(&ctx, id, calendar).await
            }
        },
        Some(Command::Config { action }) => match action {
            ConfigAction::Dump => commands::config::dump(&ctx),
            ConfigAction::Validate => commands::config::validate(&ctx),
            ConfigAction::Path => commands::config::path(&ctx),
        },
        None => {
            Cli::command()
                .print_help()
                .map_err(ClientError::Io)?;
            println!();
            println!("Quick start:");
            println!("  1. Sign in: calbridge auth login --client-id <ID>");
            println!("  2. Today's agenda: calbridge events --today");
            Ok(())
        }
    }
}
