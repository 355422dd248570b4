//! Account profile model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public profile row kept alongside each account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Same id as the auth user
    pub id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    /// Last profile activity; may be absent for accounts that never signed in
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Username when set, otherwise the supplied email, otherwise a placeholder.
    #[must_use]
    pub fn display_name(&self, email: Option<&str>) -> String {
        self.username
            .as_deref()
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .or_else(|| email.map(str::trim).filter(|email| !email.is_empty()))
            .unwrap_or("Unnamed User")
            .to_string()
    }

    #[must_use]
    pub const fn role_label(&self) -> &'static str {
        if self.is_admin {
            "Admin"
        } else {
            "User"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(username: Option<&str>) -> Profile {
        Profile {
            id: "user-1".to_string(),
            username: username.map(str::to_string),
            avatar_url: None,
            is_admin: false,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn display_name_prefers_username_then_email() {
        assert_eq!(profile(Some("alex")).display_name(Some("a@x.io")), "alex");
        assert_eq!(profile(Some("  ")).display_name(Some("a@x.io")), "a@x.io");
        assert_eq!(profile(None).display_name(None), "Unnamed User");
    }

    #[test]
    fn profile_row_without_activity_parses() {
        let parsed: Profile = serde_json::from_str(
            r#"{"id":"u","username":null,"created_at":"2025-01-01T00:00:00Z","is_admin":true}"#,
        )
        .unwrap();
        assert!(parsed.is_admin);
        assert_eq!(parsed.updated_at, None);
        assert_eq!(parsed.role_label(), "Admin");
    }
}
