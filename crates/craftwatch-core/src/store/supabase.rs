//! PostgREST-backed store for the hosted project.

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::{ProfileStore, ServerStore};
use crate::auth::{normalize_auth_url, SessionContext};
use crate::error::{Error, Result};
use crate::models::{NewServer, Profile, ServerId, ServerPatch, ServerRecord};
use crate::util::parse_api_error;

const SERVERS_TABLE: &str = "servers";
const PROFILES_TABLE: &str = "profiles";

/// Talks to `{supabase_url}/rest/v1` with the signed-in user's token.
///
/// Row-level security on the backend scopes every query to the caller.
#[derive(Debug, Clone)]
pub struct SupabaseStore {
    rest_url: String,
    anon_key: String,
    client: Client,
    context: SessionContext,
}

impl SupabaseStore {
    pub fn new(
        supabase_url: impl AsRef<str>,
        anon_key: impl Into<String>,
        context: SessionContext,
    ) -> Result<Self> {
        let base = normalize_auth_url(supabase_url.as_ref())?;
        let base = base.trim_end_matches("/auth/v1");
        let anon_key = anon_key.into().trim().to_string();
        if anon_key.is_empty() {
            return Err(Error::Config(
                "Supabase anon key must not be empty".to_string(),
            ));
        }

        Ok(Self {
            rest_url: format!("{base}/rest/v1"),
            anon_key,
            client: Client::builder().build()?,
            context,
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.rest_url, table)
    }

    fn authorized(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.context.access_token().ok_or(Error::AuthRequired)?;
        Ok(request.header("apikey", &self.anon_key).bearer_auth(token))
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorized(request)?.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!("Backend rejected session: {}", parse_api_error(status, &body));
            return Err(Error::AuthRequired);
        }
        Err(Error::Api(parse_api_error(status, &body)))
    }

    async fn fetch_rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Vec<T>> {
        let response = self.send(request).await?;
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl ServerStore for SupabaseStore {
    async fn list(&self, owner_id: &str) -> Result<Vec<ServerRecord>> {
        let owner_filter = format!("eq.{owner_id}");
        let request = self.client.get(self.table_url(SERVERS_TABLE)).query(&[
            ("select", "*"),
            ("user_id", owner_filter.as_str()),
            ("order", "created_at.asc"),
        ]);
        self.fetch_rows(request).await
    }

    async fn insert(&self, server: NewServer) -> Result<ServerRecord> {
        let request = self
            .client
            .post(self.table_url(SERVERS_TABLE))
            .header("Prefer", "return=representation")
            .json(&server);
        let mut rows: Vec<ServerRecord> = self.fetch_rows(request).await?;
        if rows.is_empty() {
            return Err(Error::Api(
                "Insert response did not include the new server".to_string(),
            ));
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, id: &ServerId, patch: ServerPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let id_filter = format!("eq.{id}");
        let request = self
            .client
            .patch(self.table_url(SERVERS_TABLE))
            .query(&[("id", id_filter.as_str())])
            .json(&patch);
        self.send(request).await?;
        Ok(())
    }

    async fn delete(&self, id: &ServerId) -> Result<()> {
        let id_filter = format!("eq.{id}");
        let request = self
            .client
            .delete(self.table_url(SERVERS_TABLE))
            .query(&[("id", id_filter.as_str())]);
        self.send(request).await?;
        Ok(())
    }
}

impl ProfileStore for SupabaseStore {
    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let request = self
            .client
            .get(self.table_url(PROFILES_TABLE))
            .query(&[("select", "*"), ("order", "created_at.desc")]);
        self.fetch_rows(request).await
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        let id_filter = format!("eq.{id}");
        let request = self
            .client
            .get(self.table_url(PROFILES_TABLE))
            .query(&[("select", "*"), ("id", id_filter.as_str())]);
        let rows: Vec<Profile> = self.fetch_rows(request).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_profile(&self, id: &str) -> Result<()> {
        let id_filter = format!("eq.{id}");
        let request = self
            .client
            .delete(self.table_url(PROFILES_TABLE))
            .query(&[("id", id_filter.as_str())]);
        self.send(request).await?;
        Ok(())
    }

    async fn set_admin(&self, id: &str, is_admin: bool) -> Result<()> {
        let id_filter = format!("eq.{id}");
        let request = self
            .client
            .patch(self.table_url(PROFILES_TABLE))
            .query(&[("id", id_filter.as_str())])
            .json(&serde_json::json!({ "is_admin": is_admin }));
        self.send(request).await?;
        Ok(())
    }
}
