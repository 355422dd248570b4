pub mod admin;
pub mod auth_cmd;
pub mod common;
pub mod completions;
pub mod config;
pub mod probe;
pub mod refresh;
pub mod servers;
pub mod stats;
