use craftwatch_core::StatusProbe;

use crate::commands::common::{resolve_client_config, status_probe};
use crate::error::CliError;

pub async fn run_probe(
    address: &str,
    as_json: bool,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let address = address.trim();
    if address.is_empty() {
        return Err(CliError::Config("Address cannot be empty".to_string()));
    }

    let (_, config) = resolve_client_config(global_profile)?;
    let result = status_probe(&config)?.probe(address).await;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    if !result.online {
        println!("{address} is offline (or the status API could not reach it)");
        return Ok(());
    }

    let max = result.players.map_or(0, |players| players.max);
    println!(
        "{address} is online with {}/{max} players",
        result.players_online()
    );
    if let Some(version) = &result.version {
        println!("Version: {version}");
    }
    if let Some(motd) = &result.motd {
        for line in &motd.clean {
            println!("  {}", line.trim());
        }
    }
    Ok(())
}
