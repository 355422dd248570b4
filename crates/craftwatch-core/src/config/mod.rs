//! Client configuration.
//!
//! Provides the `ClientConfig` struct used by every Craftwatch interface to
//! discover the hosted auth/database project and the public status API.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// Public status API used when no override is configured.
pub const DEFAULT_STATUS_API_URL: &str = "https://api.mcsrvstat.us";

/// Period between timer-driven refresh cycles.
pub const DEFAULT_REFRESH_INTERVAL_SECS: u64 = 120;

/// Runtime client configuration.
///
/// These values are safe-to-ship public endpoints/keys. Secret credentials
/// must never be stored here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
    #[serde(default = "default_status_api_url")]
    pub status_api_url: String,
    #[serde(default = "default_refresh_interval_secs")]
    pub refresh_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            supabase_url: None,
            supabase_anon_key: None,
            status_api_url: default_status_api_url(),
            refresh_interval_secs: default_refresh_interval_secs(),
        }
    }
}

impl ClientConfig {
    /// Read configuration from `SUPABASE_URL`, `SUPABASE_ANON_KEY`,
    /// `CRAFTWATCH_STATUS_API_URL` and `CRAFTWATCH_REFRESH_INTERVAL_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Overlay any environment-provided values on top of `self`.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(url) = normalize_text_option(lookup("SUPABASE_URL")) {
            self.supabase_url = Some(url);
        }
        if let Some(key) = normalize_text_option(lookup("SUPABASE_ANON_KEY")) {
            self.supabase_anon_key = Some(key);
        }
        if let Some(url) = normalize_text_option(lookup("CRAFTWATCH_STATUS_API_URL")) {
            self.status_api_url = url;
        }
        if let Some(raw) = normalize_text_option(lookup("CRAFTWATCH_REFRESH_INTERVAL_SECS")) {
            self.refresh_interval_secs = raw.parse().map_err(|_| {
                Error::Config(format!(
                    "CRAFTWATCH_REFRESH_INTERVAL_SECS must be a whole number of seconds, got '{raw}'"
                ))
            })?;
        }
        self.normalized()
    }

    /// Trim values, strip trailing slashes, and reject malformed settings.
    pub fn normalized(self) -> Result<Self> {
        let supabase_url = normalize_text_option(self.supabase_url)
            .map(|url| normalize_http_url(&url, "supabase_url"))
            .transpose()?;
        let supabase_anon_key = normalize_text_option(self.supabase_anon_key);
        let status_api_url = normalize_http_url(&self.status_api_url, "status_api_url")?;

        if self.refresh_interval_secs == 0 {
            return Err(Error::Config(
                "refresh_interval_secs must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            supabase_url,
            supabase_anon_key,
            status_api_url,
            refresh_interval_secs: self.refresh_interval_secs,
        })
    }

    /// Returns the hosted backend URL and anon key, if both are configured.
    ///
    /// Having only one of the two is a configuration error.
    pub fn backend(&self) -> Result<Option<(String, String)>> {
        match (&self.supabase_url, &self.supabase_anon_key) {
            (None, None) => Ok(None),
            (Some(url), Some(key)) => Ok(Some((url.clone(), key.clone()))),
            _ => Err(Error::Config(
                "SUPABASE_URL and SUPABASE_ANON_KEY must be set together".to_string(),
            )),
        }
    }

    pub const fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

fn default_status_api_url() -> String {
    DEFAULT_STATUS_API_URL.to_string()
}

const fn default_refresh_interval_secs() -> u64 {
    DEFAULT_REFRESH_INTERVAL_SECS
}

fn normalize_http_url(raw: &str, field: &str) -> Result<String> {
    let value = raw.trim();
    if value.is_empty() {
        return Err(Error::Config(format!("{field} must not be empty")));
    }
    if !is_http_url(value) {
        return Err(Error::Config(format!(
            "{field} must include http:// or https://"
        )));
    }
    Ok(value.trim_end_matches('/').to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_point_at_public_status_api() {
        let config = ClientConfig::default().normalized().unwrap();
        assert_eq!(config.status_api_url, "https://api.mcsrvstat.us");
        assert_eq!(config.refresh_interval(), Duration::from_secs(120));
        assert!(config.backend().unwrap().is_none());
    }

    #[test]
    fn overrides_are_trimmed_and_normalized() {
        let config = ClientConfig::default()
            .with_overrides(lookup(&[
                ("SUPABASE_URL", " https://demo.supabase.co/ "),
                ("SUPABASE_ANON_KEY", "anon"),
                ("CRAFTWATCH_STATUS_API_URL", "http://localhost:8080/"),
                ("CRAFTWATCH_REFRESH_INTERVAL_SECS", "30"),
            ]))
            .unwrap();

        assert_eq!(
            config.backend().unwrap(),
            Some(("https://demo.supabase.co".to_string(), "anon".to_string()))
        );
        assert_eq!(config.status_api_url, "http://localhost:8080");
        assert_eq!(config.refresh_interval_secs, 30);
    }

    #[test]
    fn rejects_half_configured_backend() {
        let config = ClientConfig::default()
            .with_overrides(lookup(&[("SUPABASE_URL", "https://demo.supabase.co")]))
            .unwrap();
        assert!(matches!(config.backend(), Err(Error::Config(_))));
    }

    #[test]
    fn rejects_bad_interval_and_scheme() {
        let interval = ClientConfig::default()
            .with_overrides(lookup(&[("CRAFTWATCH_REFRESH_INTERVAL_SECS", "soon")]))
            .unwrap_err();
        assert!(interval.to_string().contains("whole number"));

        let zero = ClientConfig {
            refresh_interval_secs: 0,
            ..ClientConfig::default()
        };
        assert!(zero.normalized().is_err());

        let scheme = ClientConfig::default()
            .with_overrides(lookup(&[("SUPABASE_URL", "demo.supabase.co")]))
            .unwrap_err();
        assert!(scheme.to_string().contains("http:// or https://"));
    }
}
