use std::env;

use craftwatch_core::util::{is_http_url, normalize_text_option};

use crate::cli::ConfigCommands;
use crate::commands::common::resolve_client_config;
use crate::config_profiles::{CliProfile, CliProfilesConfig};
use crate::error::CliError;

pub fn run_config(command: ConfigCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    match command {
        ConfigCommands::Init {
            profile,
            supabase_url,
            supabase_anon_key,
            status_api_url,
            refresh_interval,
            no_activate,
        } => run_config_init(
            profile.as_deref().or(global_profile),
            ProfileValues {
                supabase_url,
                supabase_anon_key,
                status_api_url,
                refresh_interval_secs: refresh_interval,
            },
            no_activate,
        ),
        ConfigCommands::Show => run_config_show(global_profile),
    }
}

/// Values given on the command line; unset ones fall back to the
/// environment, then to what the profile already has.
#[derive(Debug, Default)]
pub struct ProfileValues {
    pub supabase_url: Option<String>,
    pub supabase_anon_key: Option<String>,
    pub status_api_url: Option<String>,
    pub refresh_interval_secs: Option<u64>,
}

pub fn merge_profile(existing: &CliProfile, explicit: ProfileValues) -> CliProfile {
    let from_env = |key: &str| normalize_text_option(env::var(key).ok());

    CliProfile {
        supabase_url: normalize_text_option(explicit.supabase_url)
            .or_else(|| from_env("SUPABASE_URL"))
            .or_else(|| existing.supabase_url()),
        supabase_anon_key: normalize_text_option(explicit.supabase_anon_key)
            .or_else(|| from_env("SUPABASE_ANON_KEY"))
            .or_else(|| existing.supabase_anon_key()),
        status_api_url: normalize_text_option(explicit.status_api_url)
            .or_else(|| from_env("CRAFTWATCH_STATUS_API_URL"))
            .or_else(|| existing.status_api_url()),
        refresh_interval_secs: explicit
            .refresh_interval_secs
            .or(existing.refresh_interval_secs),
    }
}

pub fn validate_profile(profile: &CliProfile) -> Result<(), CliError> {
    for (field, value) in [
        ("supabase_url", profile.supabase_url()),
        ("status_api_url", profile.status_api_url()),
    ] {
        if let Some(url) = value {
            if !is_http_url(&url) {
                return Err(CliError::Config(format!(
                    "{field} must include http:// or https://"
                )));
            }
        }
    }
    if profile.refresh_interval_secs == Some(0) {
        return Err(CliError::Config(
            "refresh_interval must be at least 1 second".to_string(),
        ));
    }
    Ok(())
}

fn run_config_init(
    profile_name: Option<&str>,
    values: ProfileValues,
    no_activate: bool,
) -> Result<(), CliError> {
    let mut config = CliProfilesConfig::load()?;
    let profile_name = config.resolve_profile_name(profile_name);
    let existing = config.profile(&profile_name).cloned().unwrap_or_default();

    let merged = merge_profile(&existing, values);
    validate_profile(&merged)?;
    *config.profile_mut_or_default(&profile_name) = merged.clone();
    if !no_activate {
        config.active_profile = Some(profile_name.clone());
    }

    let path = config.save()?;
    println!(
        "Profile '{}' initialized at {}",
        profile_name,
        path.display()
    );

    let mut missing_fields = Vec::new();
    if merged.supabase_url().is_none() {
        missing_fields.push("supabase_url");
    }
    if merged.supabase_anon_key().is_none() {
        missing_fields.push("supabase_anon_key");
    }
    if missing_fields.is_empty() {
        println!(
            "Profile '{profile_name}' is ready. Run `craftwatch auth login --email <email> --password <password>`."
        );
    } else {
        println!(
            "Profile '{}' is missing: {}",
            profile_name,
            missing_fields.join(", ")
        );
    }

    Ok(())
}

fn run_config_show(global_profile: Option<&str>) -> Result<(), CliError> {
    let (profile_name, config) = resolve_client_config(global_profile)?;
    println!("Profile:          {profile_name}");
    println!(
        "Supabase URL:     {}",
        config.supabase_url.as_deref().unwrap_or("(not set)")
    );
    println!(
        "Anon key:         {}",
        if config.supabase_anon_key.is_some() {
            "(set)"
        } else {
            "(not set)"
        }
    );
    println!("Status API:       {}", config.status_api_url);
    println!("Refresh interval: {}s", config.refresh_interval_secs);
    Ok(())
}
