use chrono::Utc;

use crate::cli::AdminCommands;
use crate::commands::common::{connect, format_analytics_lines, format_user_lines};
use crate::error::CliError;

pub async fn run_admin(
    command: AdminCommands,
    global_profile: Option<&str>,
) -> Result<(), CliError> {
    let admin = connect(global_profile).await?.admin();

    match command {
        AdminCommands::Users { json } => {
            let users = admin.list_users().await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&users)?);
            } else {
                for line in format_user_lines(&users) {
                    println!("{line}");
                }
            }
        }
        AdminCommands::Analytics { period, json } => {
            let report = admin.analytics(period, Utc::now()).await?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for line in format_analytics_lines(&report) {
                    println!("{line}");
                }
            }
        }
        AdminCommands::Delete { id } => {
            admin.delete_user(id.trim()).await?;
            println!("Deleted user {}", id.trim());
        }
        AdminCommands::ToggleAdmin { id } => {
            let is_admin = admin.toggle_admin(id.trim()).await?;
            let role = if is_admin { "an admin" } else { "a regular user" };
            println!("User {} is now {role}", id.trim());
        }
    }
    Ok(())
}
