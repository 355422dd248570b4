//! Probe-and-merge pass over a batch of server records.

use std::sync::Arc;

use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::models::{ServerPatch, ServerRecord, StatusUpdate};
use crate::probe::StatusProbe;
use crate::store::ServerStore;

/// Probes every server concurrently and folds the results back in.
///
/// Records without a probe address are passed through untouched. A record
/// whose status changed is written back to the store; write failures are
/// logged and the probed value is still returned.
pub struct ServerReconciler<P, S> {
    probe: Arc<P>,
    store: Arc<S>,
}

impl<P, S> Clone for ServerReconciler<P, S> {
    fn clone(&self) -> Self {
        Self {
            probe: Arc::clone(&self.probe),
            store: Arc::clone(&self.store),
        }
    }
}

impl<P: StatusProbe, S: ServerStore> ServerReconciler<P, S> {
    pub fn new(probe: Arc<P>, store: Arc<S>) -> Self {
        Self { probe, store }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Reconcile `servers`, returning one record per input in the same order.
    ///
    /// Once `cancel` fires, records whose probe has not finished are returned
    /// unchanged and no further writes are issued.
    pub async fn reconcile(
        &self,
        servers: Vec<ServerRecord>,
        cancel: &CancellationToken,
    ) -> Vec<ServerRecord> {
        let probes = servers
            .into_iter()
            .map(|server| self.reconcile_one(server, cancel));
        join_all(probes).await
    }

    async fn reconcile_one(
        &self,
        server: ServerRecord,
        cancel: &CancellationToken,
    ) -> ServerRecord {
        let Some(address) = server.probe_address() else {
            tracing::debug!("Skipping server {} without an address", server.id);
            return server;
        };

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return server,
            result = self.probe.probe(&address) => result,
        };
        if cancel.is_cancelled() {
            return server;
        }

        let update = StatusUpdate::from(&result);
        let merged = server.with_status(update);
        if merged.status != server.status {
            tracing::info!(
                "Server {} ({}) is now {}",
                merged.name,
                address,
                merged.status
            );
            if let Err(error) = self
                .store
                .update(&merged.id, ServerPatch::from(update))
                .await
            {
                tracing::warn!("Failed to persist status for server {}: {}", merged.id, error);
            }
        }
        merged
    }
}
