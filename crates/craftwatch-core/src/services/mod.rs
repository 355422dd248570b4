//! Operations behind the dashboard's forms and admin screens.

mod admin;
mod servers;

pub use admin::{AdminService, UserSummary};
pub use servers::ServerService;
