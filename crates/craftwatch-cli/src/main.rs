//! craftwatch - keep an eye on the game servers you run.
//!
//! Lists, edits and probes the servers stored in your Supabase project, and
//! keeps their status current from the terminal.

mod auth;
mod cli;
mod commands;
mod config_profiles;
mod error;


use clap::{CommandFactory, Parser};
use craftwatch_core::models::ServerPatch;

use crate::cli::{Cli, Commands};
use crate::commands::admin::run_admin;
use crate::commands::auth_cmd::run_auth;
use crate::commands::completions::run_completions;
use crate::commands::config::run_config;
use crate::commands::probe::run_probe;
use crate::commands::refresh::{run_refresh, run_watch};
use crate::commands::servers::{run_add, run_delete, run_edit, run_list, AddArgs};
use crate::commands::stats::run_stats;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let directive = "craftwatch=info"
        .parse()
        .map_err(|error| CliError::Config(format!("Invalid log directive: {error}")))?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(directive))
        .init();

    let cli = Cli::parse();
    let profile = cli.profile.as_deref();

    match cli.command {
        Some(Commands::List { json }) => run_list(json, profile).await?,
        Some(Commands::Add {
            name,
            ip,
            port,
            url,
            status,
            no_probe,
        }) => {
            let args = AddArgs {
                name,
                ip,
                port,
                url,
                status,
                probe: !no_probe,
            };
            run_add(args, profile).await?;
        }
        Some(Commands::Edit {
            id,
            name,
            ip,
            port,
            url,
            status,
            players,
        }) => {
            let patch = ServerPatch {
                name,
                ip,
                port,
                url,
                status,
                players,
                ..ServerPatch::default()
            };
            run_edit(&id, patch, profile).await?;
        }
        Some(Commands::Delete { id }) => run_delete(&id, profile).await?,
        Some(Commands::Refresh { json }) => run_refresh(json, profile).await?,
        Some(Commands::Watch { interval }) => run_watch(interval, profile).await?,
        Some(Commands::Probe { address, json }) => run_probe(&address, json, profile).await?,
        Some(Commands::Stats { json }) => run_stats(json, profile).await?,
        Some(Commands::Admin { command }) => run_admin(command, profile).await?,
        Some(Commands::Completions { shell, output }) => {
            run_completions(shell, output.as_deref())?;
        }
        Some(Commands::Config { command }) => run_config(command, profile)?,
        Some(Commands::Auth { command }) => run_auth(command, profile).await?,
        None => {
            Cli::command().print_help().map_err(CliError::Io)?;
            println!();
        }
    }

    Ok(())
}
