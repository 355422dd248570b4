//! Persistence collaborators for server records and account profiles.
//!
//! The hosted backend owns storage and enforces that callers only see their
//! own rows; these traits are the seam the rest of the crate talks through.

mod memory;
mod supabase;

use std::future::Future;

use crate::error::Result;
use crate::models::{NewServer, Profile, ServerId, ServerPatch, ServerRecord};

pub use memory::InMemoryServerStore;
pub use supabase::SupabaseStore;

/// Record-oriented store for server entries, scoped to the signed-in owner.
pub trait ServerStore: Send + Sync + 'static {
    /// List the owner's servers, oldest first
    fn list(&self, owner_id: &str) -> impl Future<Output = Result<Vec<ServerRecord>>> + Send;

    /// Insert a server and return the stored row (with its assigned id)
    fn insert(&self, server: NewServer) -> impl Future<Output = Result<ServerRecord>> + Send;

    /// Apply a partial update
    fn update(&self, id: &ServerId, patch: ServerPatch) -> impl Future<Output = Result<()>> + Send;

    /// Delete a server
    fn delete(&self, id: &ServerId) -> impl Future<Output = Result<()>> + Send;
}

/// Account profiles, readable by admins.
pub trait ProfileStore: Send + Sync + 'static {
    /// All profiles, newest first
    fn list_profiles(&self) -> impl Future<Output = Result<Vec<Profile>>> + Send;

    fn get_profile(&self, id: &str) -> impl Future<Output = Result<Option<Profile>>> + Send;

    fn delete_profile(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    fn set_admin(&self, id: &str, is_admin: bool) -> impl Future<Output = Result<()>> + Send;
}
