use craftwatch_core::auth::{SessionContext, SignUpOutcome};

use crate::auth::{clear_stored_session, load_stored_session, ProfileAuth};
use crate::cli::AuthCommands;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

/// Auth client for the profile, or `None` when it has no backend configured.
fn auth_service_for(
    profile_name: &str,
    config: &CliProfilesConfig,
) -> Result<Option<ProfileAuth>, CliError> {
    let client_config = config
        .profile(profile_name)
        .cloned()
        .unwrap_or_default()
        .client_config()?;
    let Some((url, anon_key)) = client_config.backend()? else {
        return Ok(None);
    };
    ProfileAuth::new(profile_name, url, anon_key, SessionContext::signed_out())
        .map(Some)
        .map_err(|error| CliError::Auth(error.to_string()))
}

fn require_auth_service(
    profile_name: &str,
    config: &CliProfilesConfig,
) -> Result<ProfileAuth, CliError> {
    auth_service_for(profile_name, config)?
        .ok_or_else(|| CliError::NotConfigured(profile_name.to_string()))
}

pub async fn run_auth(command: AuthCommands, global_profile: Option<&str>) -> Result<(), CliError> {
    let config = CliProfilesConfig::load()?;

    match command {
        AuthCommands::Login {
            profile,
            email,
            password,
        } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let session = require_auth_service(&profile_name, &config)?
                .sign_in(&email, &password)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            let email_label = session.user.email.as_deref().unwrap_or("(no email)");
            println!("Signed in profile '{profile_name}' as {email_label}");
        }
        AuthCommands::Signup {
            profile,
            email,
            password,
        } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let outcome = require_auth_service(&profile_name, &config)?
                .sign_up(&email, &password)
                .await
                .map_err(|error| CliError::Auth(error.to_string()))?;
            match outcome {
                SignUpOutcome::SignedIn(_) => {
                    println!("Account created; profile '{profile_name}' is signed in as {email}");
                }
                SignUpOutcome::ConfirmationRequired => {
                    println!("Account created. Confirm your email, then run `craftwatch auth login`.");
                }
            }
        }
        AuthCommands::Status { profile } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let session = match auth_service_for(&profile_name, &config)? {
                Some(service) => service
                    .restore_session()
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?,
                None => load_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?,
            };

            if let Some(session) = session {
                let email_label = session.user.email.as_deref().unwrap_or("(no email)");
                println!(
                    "Profile '{}' is signed in as {} (expires_at={})",
                    profile_name, email_label, session.expires_at
                );
            } else {
                println!("Profile '{profile_name}' is not signed in.");
            }
        }
        AuthCommands::Logout { profile } => {
            let profile_name = config.resolve_profile_name(profile.as_deref().or(global_profile));
            let stored_session = load_stored_session(&profile_name)
                .map_err(|error| CliError::Auth(error.to_string()))?;

            match (auth_service_for(&profile_name, &config)?, stored_session) {
                (Some(service), Some(session)) => service
                    .sign_out(&session.access_token)
                    .await
                    .map_err(|error| CliError::Auth(error.to_string()))?,
                _ => clear_stored_session(&profile_name)
                    .map_err(|error| CliError::Auth(error.to_string()))?,
            }
            println!("Signed out profile '{profile_name}'");
        }
    }
    Ok(())
}
