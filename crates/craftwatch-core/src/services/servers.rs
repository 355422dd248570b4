//! Create, edit, delete and list the signed-in user's servers.

use std::sync::Arc;

use chrono::Utc;

use crate::auth::SessionContext;
use crate::error::{Error, Result};
use crate::models::{
    DashboardStats, NewServer, ServerId, ServerPatch, ServerRecord, ServerStatus, StatusUpdate,
};
use crate::probe::StatusProbe;
use crate::store::ServerStore;

pub struct ServerService<P, S> {
    probe: Arc<P>,
    store: Arc<S>,
    session: SessionContext,
}

impl<P: StatusProbe, S: ServerStore> ServerService<P, S> {
    pub fn new(probe: Arc<P>, store: Arc<S>, session: SessionContext) -> Self {
        Self {
            probe,
            store,
            session,
        }
    }

    fn owner_id(&self) -> Result<String> {
        self.session.current_user_id().ok_or(Error::AuthRequired)
    }

    pub async fn list(&self) -> Result<Vec<ServerRecord>> {
        let owner_id = self.owner_id()?;
        self.store.list(&owner_id).await
    }

    pub async fn stats(&self) -> Result<DashboardStats> {
        Ok(DashboardStats::from_servers(&self.list().await?))
    }

    /// Insert a server owned by the current user.
    ///
    /// With `seed_with_probe`, the address is probed first and the result
    /// replaces the supplied status and player count.
    pub async fn create(&self, server: NewServer, seed_with_probe: bool) -> Result<ServerRecord> {
        let owner_id = self.owner_id()?;
        let mut server = server.with_fallback_address();
        if server.name.is_empty() {
            return Err(Error::InvalidInput("Server name is required".to_string()));
        }
        server.owner_id = Some(owner_id);

        if seed_with_probe {
            if let Some(address) = server.probe_address() {
                let update = StatusUpdate::from(&self.probe.probe(&address).await);
                server.status = update.status;
                server.players = update.players;
            }
        }

        let record = self.store.insert(server).await?;
        tracing::info!("Added server {} ({})", record.name, record.id);
        Ok(record)
    }

    /// Apply a manual edit. Status and player count set here hold until the
    /// next probe overwrites them.
    pub async fn edit(&self, id: &ServerId, patch: ServerPatch) -> Result<()> {
        self.owner_id()?;
        if patch.is_empty() {
            return Err(Error::InvalidInput("Nothing to update".to_string()));
        }
        if patch.name.as_deref().is_some_and(|name| name.trim().is_empty()) {
            return Err(Error::InvalidInput("Server name must not be empty".to_string()));
        }

        let patch = ServerPatch {
            name: patch.name.map(|name| name.trim().to_string()),
            updated_at: Some(Utc::now()),
            ..patch
        };
        self.store.update(id, patch).await
    }

    /// Shortcut for marking a server as under maintenance or having issues.
    pub async fn set_status(&self, id: &ServerId, status: ServerStatus) -> Result<()> {
        self.edit(
            id,
            ServerPatch {
                status: Some(status),
                ..ServerPatch::default()
            },
        )
        .await
    }

    pub async fn delete(&self, id: &ServerId) -> Result<()> {
        self.owner_id()?;
        self.store.delete(id).await?;
        tracing::info!("Deleted server {}", id);
        Ok(())
    }
}
