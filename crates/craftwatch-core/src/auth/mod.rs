//! Account sign-in against the hosted GoTrue endpoint.
//!
//! The client keeps two copies of the session in step: the persisted one
//! (keychain, file, whatever the [`SessionPersistence`] impl chooses) and the
//! in-process [`SessionContext`] the rest of the crate reads the owner from.

mod session;

use std::fmt;

use chrono::Utc;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::util::{is_http_url, parse_api_error};

pub use session::SessionContext;

/// Sessions this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

const AUTH_PATH: &str = "/auth/v1";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
}

/// Tokens for one signed-in account. `expires_at` is a unix timestamp.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub user: AuthUser,
}

impl AuthSession {
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now().timestamp())
    }

    #[must_use]
    pub const fn is_expired_at(&self, now: i64) -> bool {
        self.expires_at <= now + EXPIRY_MARGIN_SECS
    }
}

impl fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignUpOutcome {
    SignedIn(AuthSession),
    /// The project requires email confirmation before the first sign-in
    ConfirmationRequired,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid auth input: {0}")]
    InvalidInput(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Failed to parse auth payload: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Auth API error: {0}")]
    Api(String),
    #[error("Secure storage error: {0}")]
    SecureStorage(String),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Where a signed-in session survives between runs.
pub trait SessionPersistence: Clone + Send + Sync + 'static {
    fn load_session(&self) -> AuthResult<Option<AuthSession>>;
    fn save_session(&self, session: &AuthSession) -> AuthResult<()>;
    fn clear_session(&self) -> AuthResult<()>;
}

/// Token grants accepted by `POST /token`.
enum Grant<'a> {
    Password { email: &'a str, password: &'a str },
    RefreshToken(&'a str),
}

impl Grant<'_> {
    const fn grant_type(&self) -> &'static str {
        match self {
            Self::Password { .. } => "password",
            Self::RefreshToken(_) => "refresh_token",
        }
    }

    fn body(&self) -> serde_json::Value {
        match self {
            Self::Password { email, password } => {
                serde_json::json!({ "email": email, "password": password })
            }
            Self::RefreshToken(token) => serde_json::json!({ "refresh_token": token }),
        }
    }
}

#[derive(Clone)]
pub struct SupabaseAuthClient<S: SessionPersistence> {
    auth_url: String,
    anon_key: String,
    client: Client,
    store: S,
    context: SessionContext,
}

impl<S: SessionPersistence> SupabaseAuthClient<S> {
    pub fn new(
        url: impl AsRef<str>,
        anon_key: impl Into<String>,
        store: S,
        context: SessionContext,
    ) -> AuthResult<Self> {
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(AuthError::InvalidInput(
                "anon key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            auth_url: normalize_auth_url(url.as_ref())?,
            anon_key,
            client: Client::builder().build()?,
            store,
            context,
        })
    }

    pub const fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Load the persisted session into the context, refreshing it when it is
    /// about to expire. A session that cannot be refreshed is forgotten.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        let Some(stored) = self.store.load_session()? else {
            self.context.clear();
            return Ok(None);
        };

        if !stored.is_expired() {
            self.context.set(stored.clone());
            return Ok(Some(stored));
        }

        tracing::debug!("Stored session for {} expired; refreshing", stored.user.id);
        match self.refresh_session(&stored.refresh_token).await {
            Ok(refreshed) => Ok(Some(refreshed)),
            Err(error) => {
                tracing::warn!("Dropping stored session that could not be refreshed: {}", error);
                self.forget()?;
                Ok(None)
            }
        }
    }

    /// Keep the context usable for long-running callers.
    ///
    /// A newer unexpired session persisted by another process (a sign-in from
    /// a second shell) replaces the in-process one; the result is refreshed
    /// once it comes within the expiry margin.
    pub async fn keep_fresh(&self) -> AuthResult<Option<AuthSession>> {
        let current = self.context.current();
        let session = match self.store.load_session()? {
            Some(stored) if current.as_ref() != Some(&stored) && !stored.is_expired() => {
                tracing::debug!("Adopting session persisted for {}", stored.user.id);
                self.context.set(stored.clone());
                Some(stored)
            }
            _ => current,
        };

        match session {
            Some(session) if session.is_expired() => {
                tracing::debug!("Session for {} is about to expire; refreshing", session.user.id);
                self.refresh_session(&session.refresh_token).await.map(Some)
            }
            session => Ok(session),
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        let (email, password) = credentials(email, password)?;
        let payload = self
            .post("/signup", None, &Grant::Password { email, password }.body())
            .await?;

        match payload.into_session(Utc::now().timestamp())? {
            Some(session) => {
                self.remember(&session)?;
                Ok(SignUpOutcome::SignedIn(session))
            }
            None => Ok(SignUpOutcome::ConfirmationRequired),
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        let (email, password) = credentials(email, password)?;
        let session = self.grant(&Grant::Password { email, password }).await?;
        tracing::info!("Signed in as {}", session.user.id);
        Ok(session)
    }

    pub async fn refresh_session(&self, refresh_token: &str) -> AuthResult<AuthSession> {
        let refresh_token = refresh_token.trim();
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidInput(
                "refresh token must not be empty".to_string(),
            ));
        }
        self.grant(&Grant::RefreshToken(refresh_token)).await
    }

    /// Revoke the session server-side, then forget it locally. An already
    /// invalid token still counts as signed out.
    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let response = self
            .client
            .post(self.endpoint("/logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() && status != StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        self.forget()
    }

    async fn grant(&self, grant: &Grant<'_>) -> AuthResult<AuthSession> {
        let payload = self
            .post("/token", Some(grant.grant_type()), &grant.body())
            .await?;
        let session = payload
            .into_session(Utc::now().timestamp())?
            .ok_or_else(|| AuthError::Api("token grant returned no session".to_string()))?;
        self.remember(&session)?;
        Ok(session)
    }

    async fn post(
        &self,
        path: &str,
        grant_type: Option<&str>,
        body: &serde_json::Value,
    ) -> AuthResult<TokenPayload> {
        let mut request = self
            .client
            .post(self.endpoint(path))
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .json(body);
        if let Some(grant_type) = grant_type {
            request = request.query(&[("grant_type", grant_type)]);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(AuthError::Api(parse_api_error(status, &body)));
        }
        Ok(response.json().await?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.auth_url)
    }

    fn remember(&self, session: &AuthSession) -> AuthResult<()> {
        self.store.save_session(session)?;
        self.context.set(session.clone());
        Ok(())
    }

    fn forget(&self) -> AuthResult<()> {
        self.store.clear_session()?;
        self.context.clear();
        Ok(())
    }
}

/// Base URL of the GoTrue API for a project URL, with or without the
/// `/auth/v1` suffix already present.
pub fn normalize_auth_url(url: &str) -> AuthResult<String> {
    let base = url.trim().trim_end_matches('/');
    if !is_http_url(base) {
        return Err(AuthError::InvalidInput(format!(
            "project URL '{base}' must include http:// or https://"
        )));
    }
    let base = base.strip_suffix(AUTH_PATH).unwrap_or(base);
    Ok(format!("{base}{AUTH_PATH}"))
}

fn credentials<'a>(email: &'a str, password: &'a str) -> AuthResult<(&'a str, &'a str)> {
    let email = email.trim();
    if email.is_empty() {
        return Err(AuthError::InvalidInput("email is required".to_string()));
    }
    if password.is_empty() {
        return Err(AuthError::InvalidInput("password is required".to_string()));
    }
    Ok((email, password))
}

/// Token response from GoTrue. Sign-up nests the tokens under `session`;
/// the token endpoint returns them at the top level.
#[derive(Debug, Default, Deserialize)]
struct TokenPayload {
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
    expires_in: Option<i64>,
    user: Option<AuthUser>,
    session: Option<Box<TokenPayload>>,
}

impl TokenPayload {
    /// `Ok(None)` when only a user came back (email confirmation pending).
    fn into_session(self, now: i64) -> AuthResult<Option<AuthSession>> {
        if let Some(mut nested) = self.session {
            if nested.user.is_none() {
                nested.user = self.user;
            }
            return nested.into_session(now);
        }

        let expires_at = self
            .expires_at
            .or_else(|| self.expires_in.map(|secs| now.saturating_add(secs)));
        match (self.access_token, self.refresh_token, expires_at, self.user) {
            (Some(access_token), Some(refresh_token), Some(expires_at), Some(user)) => {
                Ok(Some(AuthSession {
                    access_token,
                    refresh_token,
                    expires_at,
                    user,
                }))
            }
            (None, None, None, Some(_)) => Ok(None),
            _ => Err(AuthError::Api(
                "auth response is missing session fields".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    #[derive(Clone, Default)]
    struct MemorySlot(Arc<Mutex<Option<AuthSession>>>);

    impl SessionPersistence for MemorySlot {
        fn load_session(&self) -> AuthResult<Option<AuthSession>> {
            Ok(self.0.lock().unwrap().clone())
        }

        fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
            *self.0.lock().unwrap() = Some(session.clone());
            Ok(())
        }

        fn clear_session(&self) -> AuthResult<()> {
            *self.0.lock().unwrap() = None;
            Ok(())
        }
    }

    fn session(access_token: &str, expires_at: i64) -> AuthSession {
        AuthSession {
            access_token: access_token.to_string(),
            refresh_token: format!("refresh-{access_token}"),
            expires_at,
            user: AuthUser {
                id: "user-1".to_string(),
                email: None,
            },
        }
    }

    /// Token endpoint that answers every refresh grant with `renewed`.
    async fn token_endpoint() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut buffer = vec![0u8; 4096];
                let read = socket.read(&mut buffer).await.unwrap_or(0);
                let request = String::from_utf8_lossy(&buffer[..read]).into_owned();
                let (status, body) =
                    if request.starts_with("POST /auth/v1/token?grant_type=refresh_token ") {
                        (
                            "200 OK",
                            r#"{"access_token":"renewed","refresh_token":"refresh-renewed","expires_in":3600,"user":{"id":"user-1","email":null}}"#,
                        )
                    } else {
                        ("404 Not Found", r#"{"msg":"not found"}"#)
                    };
                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
                // Drain until the client hangs up so the close is clean.
                let _ = socket.read_to_end(&mut Vec::new()).await;
            }
        });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn expired_session_is_refreshed_in_place() {
        let slot = MemorySlot::default();
        let expired = session("stale", 1_000);
        slot.save_session(&expired).unwrap();
        let client = SupabaseAuthClient::new(
            token_endpoint().await,
            "anon",
            slot.clone(),
            SessionContext::with_session(expired),
        )
        .unwrap();

        let refreshed = client.keep_fresh().await.unwrap().unwrap();

        assert_eq!(refreshed.access_token, "renewed");
        assert!(!refreshed.is_expired());
        assert_eq!(client.context().access_token().as_deref(), Some("renewed"));
        assert_eq!(slot.load_session().unwrap(), Some(refreshed));
    }

    #[tokio::test]
    async fn newer_persisted_session_is_adopted_without_refreshing() {
        let slot = MemorySlot::default();
        let far_future = Utc::now().timestamp() + 3_600;
        slot.save_session(&session("from-other-shell", far_future))
            .unwrap();
        // Nothing listens here, so any refresh attempt would fail.
        let client = SupabaseAuthClient::new(
            "http://127.0.0.1:9",
            "anon",
            slot,
            SessionContext::with_session(session("stale", 1_000)),
        )
        .unwrap();

        let adopted = client.keep_fresh().await.unwrap().unwrap();

        assert_eq!(adopted.access_token, "from-other-shell");
        assert_eq!(
            client.context().access_token().as_deref(),
            Some("from-other-shell")
        );
    }

    #[tokio::test]
    async fn signed_out_context_stays_signed_out() {
        let client = SupabaseAuthClient::new(
            "http://127.0.0.1:9",
            "anon",
            MemorySlot::default(),
            SessionContext::signed_out(),
        )
        .unwrap();

        assert_eq!(client.keep_fresh().await.unwrap(), None);
    }

    #[test]
    fn auth_url_gets_suffix_once() {
        assert_eq!(
            normalize_auth_url("https://demo.supabase.co").unwrap(),
            "https://demo.supabase.co/auth/v1"
        );
        assert_eq!(
            normalize_auth_url(" https://demo.supabase.co/auth/v1/ ").unwrap(),
            "https://demo.supabase.co/auth/v1"
        );
        assert!(normalize_auth_url("demo.supabase.co").is_err());
    }

    #[test]
    fn credentials_are_required() {
        assert!(credentials(" ", "pw").is_err());
        assert!(credentials("steve@example.com", "").is_err());
        assert_eq!(
            credentials(" steve@example.com ", "pw").unwrap(),
            ("steve@example.com", "pw")
        );
    }

    #[test]
    fn user_without_tokens_means_confirmation_pending() {
        let payload: TokenPayload =
            serde_json::from_str(r#"{"user": {"id": "user-1", "email": "steve@example.com"}}"#)
                .unwrap();
        assert!(payload.into_session(0).unwrap().is_none());
    }

    #[test]
    fn nested_session_is_unwrapped() {
        let payload: TokenPayload = serde_json::from_str(
            r#"{
                "user": {"id": "user-1", "email": "steve@example.com"},
                "session": {"access_token": "a", "refresh_token": "r", "expires_in": 3600}
            }"#,
        )
        .unwrap();
        let session = payload.into_session(1_700_000_000).unwrap().unwrap();
        assert_eq!(session.user.id, "user-1");
        assert_eq!(session.expires_at, 1_700_003_600);
    }

    #[test]
    fn partial_tokens_are_rejected() {
        let payload: TokenPayload =
            serde_json::from_str(r#"{"access_token": "a", "user": {"id": "u", "email": null}}"#)
                .unwrap();
        assert!(matches!(payload.into_session(0), Err(AuthError::Api(_))));
    }

    #[test]
    fn sessions_expire_a_minute_early() {
        let session = AuthSession {
            access_token: "secret-access-token".to_string(),
            refresh_token: "secret-refresh-token".to_string(),
            expires_at: 1_000,
            user: AuthUser {
                id: "user".to_string(),
                email: None,
            },
        };
        assert!(!session.is_expired_at(900));
        assert!(session.is_expired_at(950));

        let rendered = format!("{session:?}");
        assert!(!rendered.contains("secret-access-token"));
        assert!(rendered.contains("[REDACTED]"));
    }
}
