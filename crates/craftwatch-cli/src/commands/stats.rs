use crate::commands::common::{connect, format_stats_lines};
use crate::error::CliError;

pub async fn run_stats(as_json: bool, global_profile: Option<&str>) -> Result<(), CliError> {
    let stats = connect(global_profile).await?.servers().stats().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        for line in format_stats_lines(&stats) {
            println!("{line}");
        }
    }
    Ok(())
}
