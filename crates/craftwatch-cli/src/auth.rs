//! Per-profile sign-in, with the session kept in the OS keychain.

use craftwatch_core::auth::{
    AuthResult, SessionContext, SessionPersistence, SignUpOutcome, SupabaseAuthClient,
};
pub use craftwatch_core::auth::{AuthError, AuthSession};

#[cfg(not(test))]
const KEYCHAIN_SERVICE: &str = "craftwatch-cli";

/// Keychain slot holding one profile's serialized session.
///
/// Test builds swap the keychain for a process-wide map so tests never touch
/// the real credential store.
#[derive(Clone)]
struct KeychainSlot {
    account: String,
}

impl KeychainSlot {
    fn for_profile(profile_name: &str) -> Self {
        Self {
            account: format!("session:{profile_name}"),
        }
    }
}

#[cfg(not(test))]
impl KeychainSlot {
    fn entry(&self) -> AuthResult<keyring::Entry> {
        keyring::Entry::new(KEYCHAIN_SERVICE, &self.account).map_err(storage_error)
    }

    fn read(&self) -> AuthResult<Option<String>> {
        match self.entry()?.get_password() {
            Ok(raw) => Ok(Some(raw)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(storage_error(error)),
        }
    }

    fn write(&self, raw: &str) -> AuthResult<()> {
        self.entry()?.set_password(raw).map_err(storage_error)
    }

    fn erase(&self) -> AuthResult<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(storage_error(error)),
        }
    }
}

#[cfg(test)]
impl KeychainSlot {
    fn with_map<T>(
        &self,
        f: impl FnOnce(&mut std::collections::HashMap<String, String>) -> T,
    ) -> AuthResult<T> {
        use std::collections::HashMap;
        use std::sync::{Mutex, OnceLock};

        static SLOTS: OnceLock<Mutex<HashMap<String, String>>> = OnceLock::new();
        let mut slots = SLOTS
            .get_or_init(Mutex::default)
            .lock()
            .map_err(storage_error)?;
        Ok(f(&mut slots))
    }

    fn read(&self) -> AuthResult<Option<String>> {
        self.with_map(|slots| slots.get(&self.account).cloned())
    }

    fn write(&self, raw: &str) -> AuthResult<()> {
        self.with_map(|slots| {
            slots.insert(self.account.clone(), raw.to_string());
        })
    }

    fn erase(&self) -> AuthResult<()> {
        self.with_map(|slots| {
            slots.remove(&self.account);
        })
    }
}

fn storage_error(error: impl std::fmt::Display) -> AuthError {
    AuthError::SecureStorage(error.to_string())
}

impl SessionPersistence for KeychainSlot {
    fn load_session(&self) -> AuthResult<Option<AuthSession>> {
        self.read()?
            .map(|raw| serde_json::from_str(&raw))
            .transpose()
            .map_err(AuthError::from)
    }

    fn save_session(&self, session: &AuthSession) -> AuthResult<()> {
        self.write(&serde_json::to_string(session)?)
    }

    fn clear_session(&self) -> AuthResult<()> {
        self.erase()
    }
}

/// Auth client bound to one profile's keychain slot.
#[derive(Clone)]
pub struct ProfileAuth {
    client: SupabaseAuthClient<KeychainSlot>,
}

impl ProfileAuth {
    pub fn new(
        profile_name: &str,
        url: impl AsRef<str>,
        anon_key: impl AsRef<str>,
        context: SessionContext,
    ) -> AuthResult<Self> {
        let client = SupabaseAuthClient::new(
            url,
            anon_key.as_ref(),
            KeychainSlot::for_profile(profile_name),
            context,
        )?;
        Ok(Self { client })
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<AuthSession> {
        self.client.sign_in(email, password).await
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> AuthResult<SignUpOutcome> {
        self.client.sign_up(email, password).await
    }

    /// Load the stored session into the context, refreshing it if needed.
    pub async fn restore_session(&self) -> AuthResult<Option<AuthSession>> {
        self.client.restore_session().await
    }

    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        self.client.sign_out(access_token).await
    }

    /// Pick up a sign-in from another shell and refresh the token before it
    /// lapses. Meant to be called periodically by long-running commands.
    pub async fn keep_fresh(&self) -> AuthResult<Option<AuthSession>> {
        self.client.keep_fresh().await
    }
}

/// Stored session for a profile, read without contacting the backend.
pub fn load_stored_session(profile_name: &str) -> AuthResult<Option<AuthSession>> {
    KeychainSlot::for_profile(profile_name).load_session()
}

pub fn clear_stored_session(profile_name: &str) -> AuthResult<()> {
    KeychainSlot::for_profile(profile_name).clear_session()
}

#[cfg(test)]
mod tests {
    use craftwatch_core::auth::AuthUser;
    use pretty_assertions::assert_eq;

    use super::*;

    fn session(token: &str) -> AuthSession {
        AuthSession {
            access_token: token.to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 1_700_000_000,
            user: AuthUser {
                id: "player-one".to_string(),
                email: Some("player@example.net".to_string()),
            },
        }
    }

    #[test]
    fn profiles_have_separate_slots() {
        KeychainSlot::for_profile("slot-home")
            .save_session(&session("home-token"))
            .unwrap();

        assert_eq!(
            load_stored_session("slot-home").unwrap(),
            Some(session("home-token"))
        );
        assert_eq!(load_stored_session("slot-work").unwrap(), None);

        clear_stored_session("slot-home").unwrap();
        assert_eq!(load_stored_session("slot-home").unwrap(), None);
    }

    #[test]
    fn clearing_an_empty_slot_is_fine() {
        assert!(clear_stored_session("slot-never-used").is_ok());
    }

    #[tokio::test]
    async fn restore_without_stored_session_leaves_context_signed_out() {
        let context = SessionContext::with_session(session("stale"));
        let auth = ProfileAuth::new(
            "slot-restore-empty",
            "http://127.0.0.1:9",
            "anon",
            context.clone(),
        )
        .unwrap();

        assert_eq!(auth.restore_session().await.unwrap(), None);
        assert!(!context.is_signed_in());
    }

    #[tokio::test]
    async fn restore_uses_unexpired_stored_session() {
        let mut stored = session("fresh");
        stored.expires_at = i64::MAX / 2;
        KeychainSlot::for_profile("slot-restore-fresh")
            .save_session(&stored)
            .unwrap();

        let context = SessionContext::signed_out();
        let auth =
            ProfileAuth::new("slot-restore-fresh", "http://127.0.0.1:9", "anon", context.clone())
                .unwrap();

        assert_eq!(auth.restore_session().await.unwrap(), Some(stored));
        assert_eq!(context.current_user_id().as_deref(), Some("player-one"));
    }

    #[tokio::test]
    async fn expired_session_stays_put_when_refresh_fails() {
        // expires_at is in 2023
        let expired = session("expired");
        KeychainSlot::for_profile("slot-keep-expired")
            .save_session(&expired)
            .unwrap();
        let context = SessionContext::with_session(expired.clone());
        let auth =
            ProfileAuth::new("slot-keep-expired", "http://127.0.0.1:9", "anon", context.clone())
                .unwrap();

        assert!(matches!(auth.keep_fresh().await, Err(AuthError::Http(_))));
        assert_eq!(context.current(), Some(expired));
    }

    #[tokio::test]
    async fn sign_in_from_another_shell_reaches_running_context() {
        let context = SessionContext::with_session(session("expired"));
        let auth =
            ProfileAuth::new("slot-keep-adopt", "http://127.0.0.1:9", "anon", context.clone())
                .unwrap();

        let mut fresh = session("from-login");
        fresh.expires_at = i64::MAX / 2;
        KeychainSlot::for_profile("slot-keep-adopt")
            .save_session(&fresh)
            .unwrap();

        assert_eq!(auth.keep_fresh().await.unwrap(), Some(fresh.clone()));
        assert_eq!(context.current(), Some(fresh));
    }
}
