//! Error types for craftwatch-core

use thiserror::Error;

use crate::auth::AuthError;

/// Result type alias using craftwatch-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in craftwatch-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// HTTP transport error talking to the hosted backend
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// Backend rejected the request
    #[error("Backend error: {0}")]
    Api(String),

    /// No active session, or the backend rejected the session
    #[error("You are not signed in. Sign in again to manage your servers.")]
    AuthRequired,

    /// Admin-only operation attempted by a regular account
    #[error("This action requires an admin account")]
    Forbidden,

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid client configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A reconciliation cycle is already running
    #[error("A refresh is already in progress")]
    CycleInProgress,

    /// The cycle was cancelled before its results could be applied
    #[error("Refresh was cancelled")]
    Cancelled,

    /// Auth collaborator error
    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl Error {
    /// Whether the failure should prompt the user to sign in again.
    #[must_use]
    pub const fn requires_reauthentication(&self) -> bool {
        matches!(self, Self::AuthRequired)
    }
}
