//! craftwatch-core - Core library for Craftwatch
//!
//! This crate contains the server models, the status probe, the reconciler and
//! refresh scheduler, and the clients for the hosted auth/database backend
//! shared by every Craftwatch interface.

pub mod analytics;
pub mod auth;
pub mod config;
pub mod error;
pub mod models;
pub mod probe;
pub mod reconcile;
pub mod scheduler;
pub mod services;
pub mod store;
pub mod util;

pub use error::{Error, Result};
pub use models::{ServerId, ServerRecord, ServerStatus};
pub use probe::{ProbeResult, StatusProbe};
pub use reconcile::ServerReconciler;
pub use scheduler::{DashboardView, RefreshScheduler, RefreshState};
pub use store::{ServerStore, SupabaseStore};
