//! Dashboard summary numbers

use serde::Serialize;

use super::{ServerRecord, ServerStatus};

/// Totals shown above the server list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub players_online: u64,
    pub servers_online: usize,
    pub maintenance_count: usize,
    pub issues_count: usize,
}

impl DashboardStats {
    #[must_use]
    pub fn from_servers(servers: &[ServerRecord]) -> Self {
        servers.iter().fold(Self::default(), |mut stats, server| {
            stats.players_online += u64::from(server.players);
            match server.status {
                ServerStatus::Online => stats.servers_online += 1,
                ServerStatus::Maintenance => stats.maintenance_count += 1,
                ServerStatus::Issue => stats.issues_count += 1,
                ServerStatus::Offline => {}
            }
            stats
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::ServerId;

    fn server(status: ServerStatus, players: u32) -> ServerRecord {
        let now = Utc::now();
        ServerRecord {
            id: ServerId::new("x"),
            name: "x".to_string(),
            ip: None,
            port: None,
            url: Some("x.example.net".to_string()),
            status,
            players,
            owner_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn counts_each_status_and_sums_players() {
        let stats = DashboardStats::from_servers(&[
            server(ServerStatus::Online, 5),
            server(ServerStatus::Online, 2),
            server(ServerStatus::Maintenance, 0),
            server(ServerStatus::Issue, 1),
            server(ServerStatus::Offline, 0),
        ]);
        assert_eq!(
            stats,
            DashboardStats {
                players_online: 8,
                servers_online: 2,
                maintenance_count: 1,
                issues_count: 1,
            }
        );
    }

    #[test]
    fn empty_list_is_all_zero() {
        assert_eq!(DashboardStats::from_servers(&[]), DashboardStats::default());
    }
}
