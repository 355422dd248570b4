//! Admin-only account management and analytics.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::analytics::{aggregate, AnalyticsReport, TimePeriod};
use crate::auth::SessionContext;
use crate::error::{Error, Result};
use crate::models::Profile;
use crate::store::ProfileStore;

/// Row of the admin user table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub display_name: String,
    /// Only known for the signed-in account
    pub email: Option<String>,
    #[serde(flatten)]
    pub profile: Profile,
}

pub struct AdminService<S> {
    store: Arc<S>,
    session: SessionContext,
}

impl<S: ProfileStore> AdminService<S> {
    pub fn new(store: Arc<S>, session: SessionContext) -> Self {
        Self { store, session }
    }

    /// Fails unless the signed-in account's profile has `is_admin` set.
    pub async fn ensure_admin(&self) -> Result<Profile> {
        let user_id = self.session.current_user_id().ok_or(Error::AuthRequired)?;
        match self.store.get_profile(&user_id).await? {
            Some(profile) if profile.is_admin => Ok(profile),
            _ => Err(Error::Forbidden),
        }
    }

    /// All accounts, newest first.
    pub async fn list_users(&self) -> Result<Vec<UserSummary>> {
        let current = self.ensure_admin().await?;
        let email = self
            .session
            .current()
            .and_then(|session| session.user.email);

        let users = self
            .store
            .list_profiles()
            .await?
            .into_iter()
            .map(|profile| {
                let email = (profile.id == current.id).then(|| email.clone()).flatten();
                UserSummary {
                    display_name: profile.display_name(email.as_deref()),
                    email,
                    profile,
                }
            })
            .collect();
        Ok(users)
    }

    pub async fn delete_user(&self, id: &str) -> Result<()> {
        let current = self.ensure_admin().await?;
        if current.id == id {
            return Err(Error::InvalidInput(
                "Admins cannot delete their own account".to_string(),
            ));
        }
        self.store.delete_profile(id).await?;
        tracing::info!("Deleted profile {}", id);
        Ok(())
    }

    /// Flip the admin flag and return the new value.
    pub async fn toggle_admin(&self, id: &str) -> Result<bool> {
        self.ensure_admin().await?;
        let profile = self
            .store
            .get_profile(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        let is_admin = !profile.is_admin;
        self.store.set_admin(id, is_admin).await?;
        tracing::info!(
            "User {} is now {}",
            profile.display_name(None),
            if is_admin { "an admin" } else { "a regular user" }
        );
        Ok(is_admin)
    }

    pub async fn analytics(
        &self,
        period: TimePeriod,
        now: DateTime<Utc>,
    ) -> Result<AnalyticsReport> {
        self.ensure_admin().await?;
        let profiles = self.store.list_profiles().await?;
        Ok(aggregate(&profiles, period, now))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::auth::{AuthSession, AuthUser};
    use crate::store::InMemoryServerStore;

    fn profile(id: &str, username: Option<&str>, is_admin: bool) -> Profile {
        Profile {
            id: id.to_string(),
            username: username.map(str::to_string),
            avatar_url: None,
            is_admin,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    fn session_for(user_id: &str) -> SessionContext {
        SessionContext::with_session(AuthSession {
            access_token: "token".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: i64::MAX,
            user: AuthUser {
                id: user_id.to_string(),
                email: Some(format!("{user_id}@example.net")),
            },
        })
    }

    fn service(user_id: &str) -> (AdminService<InMemoryServerStore>, InMemoryServerStore) {
        let store = InMemoryServerStore::new().with_profiles(vec![
            profile("admin", None, true),
            profile("player", Some("steve"), false),
            profile("quiet", None, false),
        ]);
        (
            AdminService::new(Arc::new(store.clone()), session_for(user_id)),
            store,
        )
    }

    #[tokio::test]
    async fn regular_users_are_forbidden() {
        let (service, _) = service("player");
        assert!(matches!(service.list_users().await, Err(Error::Forbidden)));
        assert!(matches!(
            service.toggle_admin("quiet").await,
            Err(Error::Forbidden)
        ));
    }

    #[tokio::test]
    async fn signed_out_admin_view_requires_auth() {
        let store = Arc::new(InMemoryServerStore::new());
        let service = AdminService::new(store, SessionContext::signed_out());
        assert!(matches!(
            service.ensure_admin().await,
            Err(Error::AuthRequired)
        ));
    }

    #[tokio::test]
    async fn user_list_only_shows_own_email() {
        let (service, _) = service("admin");
        let users = service.list_users().await.unwrap();
        let names: Vec<(&str, Option<&str>)> = users
            .iter()
            .map(|user| (user.display_name.as_str(), user.email.as_deref()))
            .collect();

        assert!(names.contains(&("admin@example.net", Some("admin@example.net"))));
        assert!(names.contains(&("steve", None)));
        assert!(names.contains(&("Unnamed User", None)));
    }

    #[tokio::test]
    async fn toggle_admin_flips_flag() {
        let (service, store) = service("admin");
        assert!(service.toggle_admin("player").await.unwrap());
        assert!(store.profiles().iter().any(|p| p.id == "player" && p.is_admin));
        assert!(!service.toggle_admin("player").await.unwrap());
    }

    #[tokio::test]
    async fn admin_cannot_delete_self() {
        let (service, store) = service("admin");
        assert!(matches!(
            service.delete_user("admin").await,
            Err(Error::InvalidInput(_))
        ));
        service.delete_user("quiet").await.unwrap();
        assert_eq!(store.profiles().len(), 2);
    }

    #[tokio::test]
    async fn analytics_counts_roles() {
        let (service, _) = service("admin");
        let report = service.analytics(TimePeriod::Week, Utc::now()).await.unwrap();
        assert_eq!(report.roles.admins, 1);
        assert_eq!(report.roles.users, 2);
        assert_eq!(report.buckets.last().unwrap().new_users, 3);
    }
}
