//! Explicit session context shared by the collaborators that need the
//! current user.

use tokio::sync::watch;

use super::AuthSession;

/// Handle to the active session.
///
/// Cloning is cheap; every clone observes the same session. Consumers that
/// need to react to sign-in/sign-out call [`SessionContext::subscribe`].
#[derive(Debug, Clone)]
pub struct SessionContext {
    tx: watch::Sender<Option<AuthSession>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::signed_out()
    }
}

impl SessionContext {
    #[must_use]
    pub fn signed_out() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    #[must_use]
    pub fn with_session(session: AuthSession) -> Self {
        let (tx, _) = watch::channel(Some(session));
        Self { tx }
    }

    pub fn current(&self) -> Option<AuthSession> {
        self.tx.borrow().clone()
    }

    pub fn current_user_id(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|session| session.user.id.clone())
    }

    pub fn access_token(&self) -> Option<String> {
        self.tx
            .borrow()
            .as_ref()
            .map(|session| session.access_token.clone())
    }

    pub fn is_signed_in(&self) -> bool {
        self.tx.borrow().is_some()
    }

    pub fn set(&self, session: AuthSession) {
        self.tx.send_replace(Some(session));
    }

    pub fn clear(&self) {
        self.tx.send_if_modified(|current| current.take().is_some());
    }

    /// Receiver that is notified on every sign-in, refresh, or sign-out.
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.tx.subscribe()
    }
}
