use craftwatch_core::models::{NewServer, ServerPatch};
use craftwatch_core::ServerStatus;

use crate::commands::common::{
    connect, format_server_lines, resolve_server, server_to_list_item, short_id, ServerListItem,
};
use crate::error::CliError;

pub async fn run_list(as_json: bool, global_profile: Option<&str>) -> Result<(), CliError> {
    let servers = connect(global_profile).await?.servers().list().await?;

    if as_json {
        let items = servers
            .iter()
            .map(server_to_list_item)
            .collect::<Vec<ServerListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_server_lines(&servers) {
            println!("{line}");
        }
    }
    Ok(())
}

pub struct AddArgs {
    pub name: String,
    pub ip: Option<String>,
    pub port: Option<u16>,
    pub url: Option<String>,
    pub status: Option<ServerStatus>,
    pub probe: bool,
}

pub async fn run_add(args: AddArgs, global_profile: Option<&str>) -> Result<(), CliError> {
    let backend = connect(global_profile).await?;
    let server = NewServer {
        ip: args.ip,
        port: args.port,
        url: args.url,
        status: args.status.unwrap_or_default(),
        ..NewServer::new(args.name)
    };

    let record = backend.servers().create(server, args.probe).await?;
    println!(
        "Added {} ({}) - {}",
        record.name,
        short_id(record.id.as_str()),
        record.status
    );
    Ok(())
}

pub async fn run_edit(
    id: &str,
    patch: ServerPatch,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let backend = connect(global_profile).await?;
    let service = backend.servers();
    let servers = service.list().await?;
    let server = resolve_server(&servers, id)?;

    service.edit(&server.id, patch).await?;
    println!("Updated {}", short_id(server.id.as_str()));
    Ok(())
}

pub async fn run_delete(id: &str, global_profile: Option<&str>) -> Result<(), CliError> {
    let backend = connect(global_profile).await?;
    let service = backend.servers();
    let servers = service.list().await?;
    let server = resolve_server(&servers, id)?;

    service.delete(&server.id).await?;
    println!("Deleted {} ({})", server.name, short_id(server.id.as_str()));
    Ok(())
}
