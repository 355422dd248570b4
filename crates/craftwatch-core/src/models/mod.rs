//! Data models for Craftwatch

mod profile;
mod server;
mod stats;

pub use profile::Profile;
pub use server::{
    NewServer, ServerId, ServerPatch, ServerRecord, ServerStatus, StatusUpdate, DEFAULT_PORT,
    SENTINEL_IP,
};
pub use stats::DashboardStats;
