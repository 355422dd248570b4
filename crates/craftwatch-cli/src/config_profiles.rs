//! Named connection profiles stored in the user's config directory.
//!
//! One file holds every profile plus the name of the active one:
//! `<config_dir>/craftwatch/cli-config.json`.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use craftwatch_core::config::ClientConfig;
use craftwatch_core::util::normalize_text_option;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

const CONFIG_VERSION: u32 = 1;
const FALLBACK_PROFILE: &str = "default";
const PROFILE_ENV_VAR: &str = "CRAFTWATCH_PROFILE";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfilesConfig {
    #[serde(default = "config_version")]
    pub version: u32,
    #[serde(default)]
    pub active_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, CliProfile>,
}

impl Default for CliProfilesConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            active_profile: None,
            profiles: BTreeMap::new(),
        }
    }
}

/// Backend and refresh settings for one profile. Unset values fall back to
/// the environment and then to built-in defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CliProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supabase_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supabase_anon_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_interval_secs: Option<u64>,
}

const fn config_version() -> u32 {
    CONFIG_VERSION
}

pub fn default_config_path() -> Result<PathBuf, CliError> {
    let dir = dirs::config_dir()
        .ok_or_else(|| CliError::Config("no config directory for this user".to_string()))?;
    Ok(dir.join("craftwatch").join("cli-config.json"))
}

/// Trimmed profile name, or `None` when blank.
pub fn normalize_profile_name(value: Option<&str>) -> Option<String> {
    normalize_text_option(value.map(str::to_string))
}

impl CliProfilesConfig {
    pub fn load() -> Result<Self, CliError> {
        Self::load_from_path(&default_config_path()?)
    }

    /// A missing file is an empty config, not an error.
    pub fn load_from_path(path: &Path) -> Result<Self, CliError> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(error) if error.kind() == ErrorKind::NotFound => return Ok(Self::default()),
            Err(error) => {
                return Err(CliError::Config(format!(
                    "cannot read {}: {error}",
                    path.display()
                )))
            }
        };

        let config: Self = serde_json::from_str(&raw).map_err(|error| {
            CliError::Config(format!("{} is not a valid profile file: {error}", path.display()))
        })?;
        Ok(config.normalized())
    }

    pub fn save(&self) -> Result<PathBuf, CliError> {
        let path = default_config_path()?;
        self.save_to_path(&path)?;
        Ok(path)
    }

    pub fn save_to_path(&self, path: &Path) -> Result<(), CliError> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_string_pretty(&self.clone().normalized())?;
        std::fs::write(path, body)?;
        tracing::debug!("Saved CLI profiles to {}", path.display());
        Ok(())
    }

    /// The `--profile` flag wins, then `CRAFTWATCH_PROFILE`, then the active
    /// profile, then `default`.
    pub fn resolve_profile_name(&self, explicit: Option<&str>) -> String {
        normalize_profile_name(explicit)
            .or_else(|| normalize_profile_name(std::env::var(PROFILE_ENV_VAR).ok().as_deref()))
            .or_else(|| normalize_profile_name(self.active_profile.as_deref()))
            .unwrap_or_else(|| FALLBACK_PROFILE.to_string())
    }

    pub fn profile(&self, name: &str) -> Option<&CliProfile> {
        self.profiles.get(name)
    }

    pub fn profile_mut_or_default(&mut self, name: &str) -> &mut CliProfile {
        self.profiles.entry(name.to_string()).or_default()
    }

    fn normalized(mut self) -> Self {
        self.active_profile = normalize_profile_name(self.active_profile.as_deref());
        self.profiles = self
            .profiles
            .into_iter()
            .map(|(name, profile)| (name, profile.normalized()))
            .collect();
        self
    }
}

impl CliProfile {
    pub fn supabase_url(&self) -> Option<String> {
        normalize_text_option(self.supabase_url.clone())
    }

    pub fn supabase_anon_key(&self) -> Option<String> {
        normalize_text_option(self.supabase_anon_key.clone())
    }

    pub fn status_api_url(&self) -> Option<String> {
        normalize_text_option(self.status_api_url.clone())
    }

    /// Client configuration for this profile; environment variables win over
    /// stored values.
    pub fn client_config(&self) -> Result<ClientConfig, CliError> {
        let defaults = ClientConfig::default();
        let config = ClientConfig {
            supabase_url: self.supabase_url(),
            supabase_anon_key: self.supabase_anon_key(),
            status_api_url: self.status_api_url().unwrap_or(defaults.status_api_url),
            refresh_interval_secs: self
                .refresh_interval_secs
                .unwrap_or(defaults.refresh_interval_secs),
        };
        Ok(config.with_env_overrides()?)
    }

    fn normalized(self) -> Self {
        Self {
            supabase_url: self.supabase_url(),
            supabase_anon_key: self.supabase_anon_key(),
            status_api_url: self.status_api_url(),
            refresh_interval_secs: self.refresh_interval_secs,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn temp_config_path(tag: &str) -> PathBuf {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_nanos());
        std::env::temp_dir().join(format!("craftwatch-{tag}-{nanos}.json"))
    }

    #[test]
    fn blank_profile_names_are_ignored() {
        assert_eq!(normalize_profile_name(None), None);
        assert_eq!(normalize_profile_name(Some("  ")), None);
        assert_eq!(normalize_profile_name(Some(" work ")), Some("work".to_string()));
    }

    #[test]
    fn missing_file_loads_as_empty_config() {
        let loaded = CliProfilesConfig::load_from_path(&temp_config_path("missing")).unwrap();
        assert_eq!(loaded, CliProfilesConfig::default());
    }

    #[test]
    fn saved_profiles_are_trimmed() {
        let path = temp_config_path("roundtrip");
        let mut config = CliProfilesConfig {
            active_profile: Some(" home ".to_string()),
            ..CliProfilesConfig::default()
        };
        *config.profile_mut_or_default("home") = CliProfile {
            supabase_url: Some(" https://project.supabase.co ".to_string()),
            supabase_anon_key: Some(" anon-key ".to_string()),
            status_api_url: Some(" ".to_string()),
            refresh_interval_secs: Some(30),
        };

        config.save_to_path(&path).unwrap();
        let loaded = CliProfilesConfig::load_from_path(&path).unwrap();
        let _ = std::fs::remove_file(&path);

        assert_eq!(loaded.active_profile.as_deref(), Some("home"));
        assert_eq!(
            loaded.profile("home"),
            Some(&CliProfile {
                supabase_url: Some("https://project.supabase.co".to_string()),
                supabase_anon_key: Some("anon-key".to_string()),
                status_api_url: None,
                refresh_interval_secs: Some(30),
            })
        );
    }

    #[test]
    fn corrupt_file_is_a_config_error() {
        let path = temp_config_path("corrupt");
        std::fs::write(&path, "{not json").unwrap();
        let result = CliProfilesConfig::load_from_path(&path);
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(CliError::Config(_))));
    }

    #[test]
    fn explicit_profile_beats_active_profile() {
        let config = CliProfilesConfig {
            active_profile: Some("work".to_string()),
            ..CliProfilesConfig::default()
        };
        assert_eq!(config.resolve_profile_name(Some("home")), "home");
        assert_eq!(config.resolve_profile_name(Some(" ")), config.resolve_profile_name(None));
    }

    #[test]
    fn explicit_profile_name_is_trimmed_and_never_empty() {
        let config = CliProfilesConfig::default();
        assert_eq!(config.resolve_profile_name(Some(" staging ")), "staging");
        assert!(!config.resolve_profile_name(None).is_empty());
    }
}
