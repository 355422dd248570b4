//! Server record model

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::probe::ProbeResult;
use crate::util::normalize_text_option;

/// Placeholder address used when a server is created without an IP or URL.
pub const SENTINEL_IP: &str = "0.0.0.0";

/// Port assumed when none is given.
pub const DEFAULT_PORT: u16 = 25565;

/// Opaque identifier assigned by the persistence backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(String);

impl ServerId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ServerId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Displayed server status.
///
/// `Online`/`Offline` are produced by probes; `Maintenance`/`Issue` can only be
/// set by hand and last until the next probe overwrites them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ServerStatus {
    Online,
    #[default]
    Offline,
    Maintenance,
    Issue,
}

impl ServerStatus {
    pub const ALL: [Self; 4] = [Self::Online, Self::Offline, Self::Maintenance, Self::Issue];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Offline => "Offline",
            Self::Maintenance => "Maintenance",
            Self::Issue => "Issue",
        }
    }
}

impl fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServerStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!("unknown status '{s}' (expected Online, Offline, Maintenance or Issue)")
            })
    }
}

/// A user-owned game server entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerRecord {
    pub id: ServerId,
    pub name: String,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default, with = "port_text")]
    pub port: Option<u16>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub status: ServerStatus,
    #[serde(default)]
    pub players: u32,
    #[serde(default, rename = "user_id")]
    pub owner_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServerRecord {
    /// Address handed to the status probe: the URL when present, otherwise
    /// `ip:port` (or the bare IP when no port is stored).
    ///
    /// Returns `None` when neither URL nor IP is populated.
    #[must_use]
    pub fn probe_address(&self) -> Option<String> {
        probe_address(self.url.as_deref(), self.ip.as_deref(), self.port)
    }

    /// Copy of this record with the derived fields taken from `update`.
    #[must_use]
    pub fn with_status(&self, update: StatusUpdate) -> Self {
        Self {
            status: update.status,
            players: update.players,
            ..self.clone()
        }
    }
}

/// Derived fields written back after a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StatusUpdate {
    pub status: ServerStatus,
    pub players: u32,
}

impl From<&ProbeResult> for StatusUpdate {
    fn from(result: &ProbeResult) -> Self {
        if result.online {
            Self {
                status: ServerStatus::Online,
                players: result.players.as_ref().map_or(0, |players| players.online),
            }
        } else {
            Self {
                status: ServerStatus::Offline,
                players: 0,
            }
        }
    }
}

impl From<StatusUpdate> for ServerPatch {
    fn from(update: StatusUpdate) -> Self {
        Self {
            status: Some(update.status),
            players: Some(update.players),
            ..Self::default()
        }
    }
}

/// Fields supplied when creating a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewServer {
    pub name: String,
    pub ip: Option<String>,
    #[serde(with = "port_text")]
    pub port: Option<u16>,
    pub url: Option<String>,
    pub status: ServerStatus,
    pub players: u32,
    #[serde(rename = "user_id")]
    pub owner_id: Option<String>,
}

impl NewServer {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Trim fields and substitute the sentinel address when neither a URL
    /// nor an IP was given. An IP without a port gets [`DEFAULT_PORT`].
    #[must_use]
    pub fn with_fallback_address(self) -> Self {
        let Self {
            name,
            ip,
            port,
            url,
            status,
            players,
            owner_id,
        } = self;

        let url = normalize_text_option(url);
        let (ip, port) = match (&url, normalize_text_option(ip)) {
            (None, None) => (Some(SENTINEL_IP.to_string()), Some(DEFAULT_PORT)),
            (_, Some(ip)) => (Some(ip), Some(port.unwrap_or(DEFAULT_PORT))),
            (Some(_), None) => (None, port),
        };

        Self {
            name: name.trim().to_string(),
            ip,
            port,
            url,
            status,
            players,
            owner_id,
        }
    }

    /// Same addressing rule as [`ServerRecord::probe_address`].
    #[must_use]
    pub fn probe_address(&self) -> Option<String> {
        probe_address(self.url.as_deref(), self.ip.as_deref(), self.port)
    }
}

fn probe_address(url: Option<&str>, ip: Option<&str>, port: Option<u16>) -> Option<String> {
    if let Some(url) = normalize_text_option(url.map(str::to_string)) {
        return Some(url);
    }
    let ip = normalize_text_option(ip.map(str::to_string))?;
    Some(match port {
        Some(port) => format!("{ip}:{port}"),
        None => ip,
    })
}

/// Partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServerPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "port_text::serialize"
    )]
    pub port: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ServerStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub players: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl ServerPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Apply the patch to an in-memory record.
    pub fn apply_to(&self, record: &mut ServerRecord) {
        if let Some(name) = &self.name {
            record.name.clone_from(name);
        }
        if let Some(ip) = &self.ip {
            record.ip = normalize_text_option(Some(ip.clone()));
        }
        if let Some(port) = self.port {
            record.port = Some(port);
        }
        if let Some(url) = &self.url {
            record.url = normalize_text_option(Some(url.clone()));
        }
        if let Some(status) = self.status {
            record.status = status;
        }
        if let Some(players) = self.players {
            record.players = players;
        }
        if let Some(updated_at) = self.updated_at {
            record.updated_at = updated_at;
        }
    }
}

/// Ports are stored as text by the backend but may come back as numbers.
mod port_text {
    use super::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawPort {
        Number(u64),
        Text(String),
    }

    #[allow(clippy::ref_option)] // serde `with` hands us `&Option<_>`
    pub fn serialize<S: Serializer>(port: &Option<u16>, serializer: S) -> Result<S::Ok, S::Error> {
        match port {
            Some(port) => serializer.serialize_str(&port.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<u16>, D::Error> {
        let raw = Option::<RawPort>::deserialize(deserializer)?;
        let port = match raw {
            None => None,
            Some(RawPort::Number(value)) => u16::try_from(value).ok(),
            Some(RawPort::Text(text)) => {
                let text = text.trim();
                if text.is_empty() {
                    None
                } else {
                    Some(text.parse::<u16>().map_err(serde::de::Error::custom)?)
                }
            }
        };
        Ok(port)
    }
}
