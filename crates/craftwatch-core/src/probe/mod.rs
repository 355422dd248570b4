//! Server status probing against the public status API.

use std::future::Future;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::{Error, Result};
use crate::models::DEFAULT_PORT;
use crate::util::is_http_url;

const USER_AGENT: &str = concat!("craftwatch/", env!("CARGO_PKG_VERSION"));

/// Player counts reported by the status API.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerCounts {
    #[serde(default)]
    pub online: u32,
    #[serde(default)]
    pub max: u32,
}

/// Message of the day, as plain text lines.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motd {
    #[serde(default)]
    pub clean: Vec<String>,
}

/// Normalized outcome of one probe.
///
/// `version` and `motd` are advisory and may be missing even for online
/// servers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub ip: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub players: Option<PlayerCounts>,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub motd: Option<Motd>,
}

impl ProbeResult {
    /// Result used when the status API could not be reached or answered
    /// with something unusable.
    ///
    /// Indistinguishable from a server that is genuinely offline.
    #[must_use]
    pub fn unreachable(address: &str) -> Self {
        Self {
            online: false,
            ip: Some(address.to_string()),
            port: Some(DEFAULT_PORT),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn players_online(&self) -> u32 {
        self.players.map_or(0, |players| players.online)
    }
}

/// Queries the status of one server address.
///
/// Implementations never fail: transport and decoding problems are folded
/// into an offline [`ProbeResult`].
pub trait StatusProbe: Send + Sync + 'static {
    fn probe(&self, address: &str) -> impl Future<Output = ProbeResult> + Send;
}

#[derive(Debug, Error)]
enum ProbeError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("status API returned HTTP {0}")]
    Status(StatusCode),
    #[error("malformed status payload: {0}")]
    Payload(#[from] serde_json::Error),
}

/// HTTP probe for `GET {base}/3/{address}`.
#[derive(Debug, Clone)]
pub struct HttpStatusProbe {
    base_url: String,
    client: Client,
}

impl HttpStatusProbe {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = base_url.as_ref().trim().trim_end_matches('/');
        if !is_http_url(base_url) {
            return Err(Error::Config(
                "status API URL must include http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            base_url: base_url.to_string(),
            client: Client::builder().user_agent(USER_AGENT).build()?,
        })
    }

    fn endpoint(&self, address: &str) -> String {
        format!("{}/3/{}", self.base_url, address.trim())
    }

    async fn fetch(&self, address: &str) -> std::result::Result<ProbeResult, ProbeError> {
        let response = self
            .client
            .get(self.endpoint(address))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ProbeError::Status(response.status()));
        }

        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl StatusProbe for HttpStatusProbe {
    async fn probe(&self, address: &str) -> ProbeResult {
        if address.trim().is_empty() {
            tracing::warn!("Refusing to probe an empty server address");
            return ProbeResult::unreachable(address);
        }

        match self.fetch(address).await {
            Ok(result) => result,
            Err(error) => {
                tracing::warn!("Status probe for {} failed: {}", address, error);
                ProbeResult::unreachable(address)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serve exactly one canned HTTP response on a random local port.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buffer = [0u8; 2048];
            let _ = socket.read(&mut buffer).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    #[test]
    fn parses_online_payload() {
        let payload = r#"{
            "online": true,
            "ip": "116.202.128.23",
            "port": 25565,
            "hostname": "example.joinmc.link",
            "debug": {"ping": true},
            "version": "1.21.1",
            "players": {"online": 5, "max": 20, "list": []},
            "motd": {"raw": ["x"], "clean": ["Welcome", "to the SMP"]}
        }"#;
        let result: ProbeResult = serde_json::from_str(payload).unwrap();
        assert!(result.online);
        assert_eq!(result.players_online(), 5);
        assert_eq!(result.players, Some(PlayerCounts { online: 5, max: 20 }));
        assert_eq!(result.version.as_deref(), Some("1.21.1"));
        assert_eq!(
            result.motd.unwrap().clean,
            vec!["Welcome".to_string(), "to the SMP".to_string()]
        );
    }

    #[test]
    fn parses_offline_payload() {
        let result: ProbeResult =
            serde_json::from_str(r#"{"online": false, "ip": "10.0.0.1", "port": 25565}"#).unwrap();
        assert!(!result.online);
        assert_eq!(result.players_online(), 0);
    }

    #[test]
    fn unreachable_result_uses_address_and_default_port() {
        let result = ProbeResult::unreachable("play.example.net");
        assert_eq!(
            result,
            ProbeResult {
                online: false,
                ip: Some("play.example.net".to_string()),
                port: Some(25565),
                ..ProbeResult::default()
            }
        );
    }

    #[test]
    fn rejects_non_http_base_url() {
        assert!(HttpStatusProbe::new("api.mcsrvstat.us").is_err());
        let probe = HttpStatusProbe::new("https://api.mcsrvstat.us/").unwrap();
        assert_eq!(
            probe.endpoint("example.joinmc.link"),
            "https://api.mcsrvstat.us/3/example.joinmc.link"
        );
    }

    #[tokio::test]
    async fn online_response_is_returned_as_is() {
        let base = serve_once(
            "200 OK",
            r#"{"online":true,"players":{"online":5,"max":20}}"#,
        )
        .await;
        let probe = HttpStatusProbe::new(base).unwrap();
        let result = probe.probe("example.joinmc.link").await;
        assert!(result.online);
        assert_eq!(result.players_online(), 5);
    }

    #[tokio::test]
    async fn server_error_becomes_offline() {
        let base = serve_once("500 Internal Server Error", r#"{"error":"boom"}"#).await;
        let probe = HttpStatusProbe::new(base).unwrap();
        let result = probe.probe("10.0.0.1:25565").await;
        assert_eq!(result, ProbeResult::unreachable("10.0.0.1:25565"));
    }

    #[tokio::test]
    async fn malformed_body_becomes_offline() {
        let base = serve_once("200 OK", "<html>not json</html>").await;
        let probe = HttpStatusProbe::new(base).unwrap();
        let result = probe.probe("10.0.0.1:25565").await;
        assert!(!result.online);
        assert_eq!(result.ip.as_deref(), Some("10.0.0.1:25565"));
    }

    #[tokio::test]
    async fn connection_failure_becomes_offline() {
        // Bind then drop to get a port nobody is listening on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let probe = HttpStatusProbe::new(format!("http://{addr}")).unwrap();
        let result = probe.probe("example.joinmc.link").await;
        assert!(!result.online);
        assert_eq!(result.port, Some(25565));
    }

    #[tokio::test]
    async fn empty_address_is_not_sent() {
        let probe = HttpStatusProbe::new("http://127.0.0.1:9").unwrap();
        let result = probe.probe("  ").await;
        assert!(!result.online);
    }
}
