use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] craftwatch_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Server ID cannot be empty")]
    EmptyServerId,
    #[error("Server not found for id/prefix: {0}")]
    ServerNotFound(String),
    #[error("{0}")]
    AmbiguousServerId(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Authentication error: {0}")]
    Auth(String),
    #[error(
        "Profile '{0}' has no backend configured. Run `craftwatch config init` or set SUPABASE_URL and SUPABASE_ANON_KEY."
    )]
    NotConfigured(String),
    #[error("Profile '{0}' is not signed in. Run `craftwatch auth login` first.")]
    NotSignedIn(String),
}
