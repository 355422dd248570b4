//! In-process store, used for tests and local experiments.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use super::{ProfileStore, ServerStore};
use crate::error::{Error, Result};
use crate::models::{NewServer, Profile, ServerId, ServerPatch, ServerRecord};

#[derive(Debug, Default)]
struct MemoryState {
    servers: Vec<ServerRecord>,
    profiles: Vec<Profile>,
    updates: Vec<(ServerId, ServerPatch)>,
    failing_updates: HashSet<ServerId>,
    fail_listing: bool,
}

/// Store backed by a shared `Vec`. Clones observe the same data.
///
/// Every `update` call is recorded, including ones configured to fail, so
/// callers can assert on what was written.
#[derive(Debug, Clone, Default)]
pub struct InMemoryServerStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryServerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_servers(servers: Vec<ServerRecord>) -> Self {
        let store = Self::new();
        store.lock().servers = servers;
        store
    }

    #[must_use]
    pub fn with_profiles(self, profiles: Vec<Profile>) -> Self {
        self.lock().profiles = profiles;
        self
    }

    /// Make every later `update` for `id` fail.
    pub fn fail_updates_for(&self, id: &ServerId) {
        self.lock().failing_updates.insert(id.clone());
    }

    /// Make `list` fail until switched back.
    pub fn set_fail_listing(&self, fail: bool) {
        self.lock().fail_listing = fail;
    }

    pub fn servers(&self) -> Vec<ServerRecord> {
        self.lock().servers.clone()
    }

    pub fn profiles(&self) -> Vec<Profile> {
        self.lock().profiles.clone()
    }

    /// Update calls received so far, in order.
    pub fn updates(&self) -> Vec<(ServerId, ServerPatch)> {
        self.lock().updates.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ServerStore for InMemoryServerStore {
    async fn list(&self, owner_id: &str) -> Result<Vec<ServerRecord>> {
        let state = self.lock();
        if state.fail_listing {
            return Err(Error::Api("simulated list failure".to_string()));
        }
        let mut servers: Vec<ServerRecord> = state
            .servers
            .iter()
            .filter(|server| server.owner_id.as_deref() == Some(owner_id))
            .cloned()
            .collect();
        servers.sort_by_key(|server| server.created_at);
        Ok(servers)
    }

    async fn insert(&self, server: NewServer) -> Result<ServerRecord> {
        let now = Utc::now();
        let record = ServerRecord {
            id: ServerId::new(Uuid::now_v7().to_string()),
            name: server.name,
            ip: server.ip,
            port: server.port,
            url: server.url,
            status: server.status,
            players: server.players,
            owner_id: server.owner_id,
            created_at: now,
            updated_at: now,
        };
        self.lock().servers.push(record.clone());
        Ok(record)
    }

    async fn update(&self, id: &ServerId, patch: ServerPatch) -> Result<()> {
        let mut state = self.lock();
        state.updates.push((id.clone(), patch.clone()));
        if state.failing_updates.contains(id) {
            return Err(Error::Api(format!("simulated update failure for {id}")));
        }
        let record = state
            .servers
            .iter_mut()
            .find(|server| &server.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        patch.apply_to(record);
        Ok(())
    }

    async fn delete(&self, id: &ServerId) -> Result<()> {
        let mut state = self.lock();
        let before = state.servers.len();
        state.servers.retain(|server| &server.id != id);
        if state.servers.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }
}

impl ProfileStore for InMemoryServerStore {
    async fn list_profiles(&self) -> Result<Vec<Profile>> {
        let mut profiles = self.profiles();
        profiles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(profiles)
    }

    async fn get_profile(&self, id: &str) -> Result<Option<Profile>> {
        Ok(self.lock().profiles.iter().find(|p| p.id == id).cloned())
    }

    async fn delete_profile(&self, id: &str) -> Result<()> {
        let mut state = self.lock();
        let before = state.profiles.len();
        state.profiles.retain(|profile| profile.id != id);
        if state.profiles.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn set_admin(&self, id: &str, is_admin: bool) -> Result<()> {
        let mut state = self.lock();
        let profile = state
            .profiles
            .iter_mut()
            .find(|profile| profile.id == id)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        profile.is_admin = is_admin;
        profile.updated_at = Some(Utc::now());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ServerStatus;

    fn owned(name: &str, owner: &str) -> NewServer {
        NewServer {
            owner_id: Some(owner.to_string()),
            url: Some(format!("{name}.example.net")),
            ..NewServer::new(name)
        }
    }

    #[tokio::test]
    async fn list_is_scoped_to_owner() {
        let store = InMemoryServerStore::new();
        store.insert(owned("mine", "alex")).await.unwrap();
        store.insert(owned("theirs", "sam")).await.unwrap();

        let servers = store.list("alex").await.unwrap();
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].name, "mine");
    }

    #[tokio::test]
    async fn update_applies_patch_and_is_recorded() {
        let store = InMemoryServerStore::new();
        let record = store.insert(owned("smp", "alex")).await.unwrap();

        let patch = ServerPatch {
            status: Some(ServerStatus::Issue),
            ..ServerPatch::default()
        };
        store.update(&record.id, patch.clone()).await.unwrap();

        assert_eq!(store.servers()[0].status, ServerStatus::Issue);
        assert_eq!(store.updates(), vec![(record.id, patch)]);
    }

    #[tokio::test]
    async fn failing_update_is_still_recorded() {
        let store = InMemoryServerStore::new();
        let record = store.insert(owned("smp", "alex")).await.unwrap();
        store.fail_updates_for(&record.id);

        let result = store.update(&record.id, ServerPatch::default()).await;
        assert!(matches!(result, Err(Error::Api(_))));
        assert_eq!(store.updates().len(), 1);
    }

    #[tokio::test]
    async fn delete_missing_server_is_not_found() {
        let store = InMemoryServerStore::new();
        let result = store.delete(&ServerId::new("nope")).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
