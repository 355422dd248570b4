use std::sync::Arc;

use chrono::{DateTime, Utc};
use craftwatch_core::analytics::AnalyticsReport;
use craftwatch_core::auth::SessionContext;
use craftwatch_core::config::ClientConfig;
use craftwatch_core::models::DashboardStats;
use craftwatch_core::probe::HttpStatusProbe;
use craftwatch_core::services::{AdminService, ServerService, UserSummary};
use craftwatch_core::{ServerRecord, SupabaseStore};
use serde::Serialize;

use crate::auth::ProfileAuth;
use crate::config_profiles::CliProfilesConfig;
use crate::error::CliError;

/// Everything a signed-in command needs.
pub struct Backend {
    pub config: ClientConfig,
    pub session: SessionContext,
    pub auth: ProfileAuth,
    pub store: Arc<SupabaseStore>,
    pub probe: Arc<HttpStatusProbe>,
}

impl Backend {
    pub fn servers(&self) -> ServerService<HttpStatusProbe, SupabaseStore> {
        ServerService::new(
            Arc::clone(&self.probe),
            Arc::clone(&self.store),
            self.session.clone(),
        )
    }

    pub fn admin(&self) -> AdminService<SupabaseStore> {
        AdminService::new(Arc::clone(&self.store), self.session.clone())
    }
}

/// Resolve the profile's config without touching the backend.
pub fn resolve_client_config(
    global_profile: Option<&str>,
) -> Result<(String, ClientConfig), CliError> {
    let profiles = CliProfilesConfig::load()?;
    let profile_name = profiles.resolve_profile_name(global_profile);
    let config = profiles
        .profile(&profile_name)
        .cloned()
        .unwrap_or_default()
        .client_config()?;
    Ok((profile_name, config))
}

pub fn status_probe(config: &ClientConfig) -> Result<HttpStatusProbe, CliError> {
    Ok(HttpStatusProbe::new(&config.status_api_url)?)
}

/// Restore the profile's session and build the backend clients around it.
pub async fn connect(global_profile: Option<&str>) -> Result<Backend, CliError> {
    let (profile_name, config) = resolve_client_config(global_profile)?;
    let Some((url, anon_key)) = config.backend()? else {
        return Err(CliError::NotConfigured(profile_name));
    };

    let session = SessionContext::signed_out();
    let auth = ProfileAuth::new(&profile_name, &url, &anon_key, session.clone())
        .map_err(|error| CliError::Auth(error.to_string()))?;
    if auth
        .restore_session()
        .await
        .map_err(|error| CliError::Auth(error.to_string()))?
        .is_none()
    {
        return Err(CliError::NotSignedIn(profile_name));
    }

    let store = SupabaseStore::new(&url, anon_key, session.clone())?;
    let probe = status_probe(&config)?;
    tracing::debug!("Connected profile '{}' to {}", profile_name, url);

    Ok(Backend {
        config,
        session,
        auth,
        store: Arc::new(store),
        probe: Arc::new(probe),
    })
}

pub fn normalize_server_identifier(id: &str) -> Result<String, CliError> {
    let id = id.trim();
    if id.is_empty() {
        Err(CliError::EmptyServerId)
    } else {
        Ok(id.to_string())
    }
}

/// Find a server by exact id or unique id prefix.
pub fn resolve_server<'a>(
    servers: &'a [ServerRecord],
    query: &str,
) -> Result<&'a ServerRecord, CliError> {
    let query = normalize_server_identifier(query)?;
    if let Some(exact) = servers.iter().find(|server| server.id.as_str() == query) {
        return Ok(exact);
    }

    let matches: Vec<&ServerRecord> = servers
        .iter()
        .filter(|server| server.id.as_str().starts_with(&query))
        .collect();
    match matches.as_slice() {
        [] => Err(CliError::ServerNotFound(query)),
        [server] => Ok(server),
        many => Err(CliError::AmbiguousServerId(format!(
            "Server id prefix '{query}' is ambiguous ({} matches). Use a longer prefix.",
            many.len()
        ))),
    }
}

#[derive(Debug, Serialize)]
pub struct ServerListItem {
    pub id: String,
    pub name: String,
    pub address: Option<String>,
    pub status: String,
    pub players: u32,
    pub updated_at: DateTime<Utc>,
}

pub fn server_to_list_item(server: &ServerRecord) -> ServerListItem {
    ServerListItem {
        id: server.id.to_string(),
        name: server.name.clone(),
        address: server.probe_address(),
        status: server.status.to_string(),
        players: server.players,
        updated_at: server.updated_at,
    }
}

pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

pub fn format_server_lines(servers: &[ServerRecord]) -> Vec<String> {
    if servers.is_empty() {
        return vec!["No servers yet. Add one with `craftwatch add`.".to_string()];
    }
    servers
        .iter()
        .map(|server| {
            format!(
                "{}  {:<11} {:>4}  {}  {}",
                short_id(server.id.as_str()),
                server.status.as_str(),
                server.players,
                server.name,
                server.probe_address().unwrap_or_else(|| "-".to_string())
            )
        })
        .collect()
}

pub fn format_stats_lines(stats: &DashboardStats) -> Vec<String> {
    vec![
        format!("Players online   {}", stats.players_online),
        format!("Servers online   {}", stats.servers_online),
        format!("Maintenance      {}", stats.maintenance_count),
        format!("Issues           {}", stats.issues_count),
    ]
}

pub fn format_user_lines(users: &[UserSummary]) -> Vec<String> {
    users
        .iter()
        .map(|user| {
            format!(
                "{}  {:<5}  {}  {}",
                user.profile.id,
                user.profile.role_label(),
                user.profile.created_at.format("%Y-%m-%d"),
                user.display_name
            )
        })
        .collect()
}

pub fn format_analytics_lines(report: &AnalyticsReport) -> Vec<String> {
    let mut lines = vec![format!("{:<10} {:>5} {:>7}", "Date", "New", "Active")];
    lines.extend(report.buckets.iter().map(|bucket| {
        format!(
            "{:<10} {:>5} {:>7}",
            bucket.label, bucket.new_users, bucket.active_users
        )
    }));
    lines.push(format!(
        "Admins: {}  Users: {}",
        report.roles.admins, report.roles.users
    ));
    lines
}
