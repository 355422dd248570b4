//! Decides when reconciliation cycles run and owns their cancellation.
//!
//! Three things start a cycle: mounting the view, a manual refresh, and a
//! fixed-period timer. A session change also restarts the listing for the new
//! user. At most one cycle is active at a time; requests that arrive while one
//! is running are dropped, never queued. Results are published through a
//! `watch` channel that the consuming view subscribes to.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::auth::{AuthSession, SessionContext};
use crate::config::DEFAULT_REFRESH_INTERVAL_SECS;
use crate::error::{Error, Result};
use crate::models::ServerRecord;
use crate::probe::StatusProbe;
use crate::reconcile::ServerReconciler;
use crate::store::ServerStore;

pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(DEFAULT_REFRESH_INTERVAL_SECS);

/// What started a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshTrigger {
    Initial,
    Manual,
    Timer,
    SessionChange,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshState {
    #[default]
    Idle,
    /// First load after mount
    Loading,
    Refreshing(RefreshTrigger),
    /// Torn down; no further transitions
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Error,
    /// The session is missing or was rejected; the user should sign in again
    AuthRequired,
}

/// User-visible message about the last failed cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl From<&Error> for Notice {
    fn from(error: &Error) -> Self {
        let kind = if error.requires_reauthentication() {
            NoticeKind::AuthRequired
        } else {
            NoticeKind::Error
        };
        Self {
            kind,
            message: error.to_string(),
        }
    }
}

/// Snapshot published to the consuming view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardView {
    pub servers: Vec<ServerRecord>,
    pub state: RefreshState,
    pub notice: Option<Notice>,
    pub last_refreshed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct CycleSlot {
    active: Option<(u64, CancellationToken)>,
    next_id: u64,
}

/// Marks a cycle as active until dropped.
struct ActiveCycle {
    slot: Arc<Mutex<CycleSlot>>,
    id: u64,
    token: CancellationToken,
}

impl Drop for ActiveCycle {
    fn drop(&mut self) {
        let mut slot = lock(&self.slot);
        if matches!(slot.active, Some((id, _)) if id == self.id) {
            slot.active = None;
        }
    }
}

struct Inner<P, S> {
    reconciler: ServerReconciler<P, S>,
    store: Arc<S>,
    session: SessionContext,
    interval: Duration,
    view: watch::Sender<DashboardView>,
    cycle: Arc<Mutex<CycleSlot>>,
    shutdown: CancellationToken,
    timer: Mutex<Option<JoinHandle<()>>>,
}

/// Handle to the refresh loop of one dashboard view.
///
/// Clones share the same loop. Everything except [`fetch_and_reconcile`]
/// must be called from inside a tokio runtime.
///
/// [`fetch_and_reconcile`]: RefreshScheduler::fetch_and_reconcile
pub struct RefreshScheduler<P, S> {
    inner: Arc<Inner<P, S>>,
}

impl<P, S> Clone for RefreshScheduler<P, S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: StatusProbe, S: ServerStore> RefreshScheduler<P, S> {
    pub fn new(probe: Arc<P>, store: Arc<S>, session: SessionContext) -> Self {
        Self::with_interval(probe, store, session, DEFAULT_REFRESH_INTERVAL)
    }

    pub fn with_interval(
        probe: Arc<P>,
        store: Arc<S>,
        session: SessionContext,
        interval: Duration,
    ) -> Self {
        let (view, _) = watch::channel(DashboardView::default());
        Self {
            inner: Arc::new(Inner {
                reconciler: ServerReconciler::new(probe, Arc::clone(&store)),
                store,
                session,
                interval,
                view,
                cycle: Arc::new(Mutex::new(CycleSlot::default())),
                shutdown: CancellationToken::new(),
                timer: Mutex::new(None),
            }),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardView> {
        self.inner.view.subscribe()
    }

    pub fn view(&self) -> DashboardView {
        self.inner.view.borrow().clone()
    }

    pub fn state(&self) -> RefreshState {
        self.inner.view.borrow().state
    }

    pub fn is_cycle_active(&self) -> bool {
        lock(&self.inner.cycle)
            .active
            .as_ref()
            .is_some_and(|(_, token)| !token.is_cancelled())
    }

    /// Run one cycle to completion and return the merged servers.
    ///
    /// Fails with [`Error::CycleInProgress`] when another cycle is active and
    /// with [`Error::Cancelled`] after teardown.
    pub async fn fetch_and_reconcile(&self) -> Result<Vec<ServerRecord>> {
        if self.inner.shutdown.is_cancelled() {
            return Err(Error::Cancelled);
        }
        let cycle = self.begin_cycle().ok_or(Error::CycleInProgress)?;
        self.run_cycle(&cycle, RefreshTrigger::Manual).await
    }

    /// Start a cycle in the background. Returns `false` when the request was
    /// ignored because a cycle is already active or the view is torn down.
    pub fn refresh_now(&self) -> bool {
        let Some(cycle) = self.begin_cycle() else {
            tracing::debug!("Ignoring refresh request; a cycle is already active");
            return false;
        };
        let scheduler = self.clone();
        tokio::spawn(async move {
            let _ = scheduler.run_cycle(&cycle, RefreshTrigger::Manual).await;
        });
        true
    }

    /// Run the initial load, then keep refreshing on the timer until
    /// [`teardown`](Self::teardown). Calling it again is a no-op.
    pub fn mount(&self) {
        if self.inner.shutdown.is_cancelled() {
            return;
        }
        let mut timer = lock(&self.inner.timer);
        if timer.is_some() {
            return;
        }
        let scheduler = self.clone();
        *timer = Some(tokio::spawn(async move { scheduler.drive().await }));
    }

    /// Cancel in-flight work and stop the timer. Results that arrive later are
    /// discarded.
    pub fn teardown(&self) {
        self.inner.shutdown.cancel();
        if let Some(handle) = lock(&self.inner.timer).take() {
            handle.abort();
        }
        self.inner.view.send_modify(|view| view.state = RefreshState::Stopped);
        tracing::debug!("Refresh scheduler stopped");
    }

    async fn drive(&self) {
        // Subscribed first so a sign-in during the initial load is not missed.
        let mut sessions = self.inner.session.subscribe();
        let mut user = signed_in_user(&mut sessions);
        let mut next = Some(RefreshTrigger::Initial);

        'drive: loop {
            if let Some(trigger) = next.take() {
                let Some(cycle) = self.begin_cycle() else {
                    tracing::debug!("Dropping {:?} cycle; another is active", trigger);
                    continue;
                };
                let run = self.run_cycle(&cycle, trigger);
                tokio::pin!(run);

                // A different user signing in or out drops the running cycle
                // before it can write or publish anything for the previous one.
                loop {
                    tokio::select! {
                        biased;
                        () = self.inner.shutdown.cancelled() => break 'drive,
                        changed = sessions.changed() => {
                            if changed.is_err() {
                                break 'drive;
                            }
                            let current = signed_in_user(&mut sessions);
                            if current != user {
                                cycle.token.cancel();
                                user = current;
                                next = self.on_session_change(user.is_some());
                                break;
                            }
                        }
                        _ = &mut run => break,
                    }
                }
                if next.is_some() {
                    continue;
                }
            }

            tokio::select! {
                biased;
                () = self.inner.shutdown.cancelled() => break,
                changed = sessions.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let current = signed_in_user(&mut sessions);
                    if current != user {
                        user = current;
                        next = self.on_session_change(user.is_some());
                    }
                }
                () = tokio::time::sleep(self.inner.interval) => next = Some(RefreshTrigger::Timer),
            }
        }
    }

    /// Cancel whatever is running and return the cycle to start next, if any.
    fn on_session_change(&self, signed_in: bool) -> Option<RefreshTrigger> {
        self.cancel_active();
        if signed_in {
            return Some(RefreshTrigger::SessionChange);
        }
        self.publish(&self.inner.shutdown, |view| {
            view.servers.clear();
            view.notice = None;
            view.state = RefreshState::Idle;
        });
        None
    }

    fn begin_cycle(&self) -> Option<ActiveCycle> {
        if self.inner.shutdown.is_cancelled() {
            return None;
        }

        let mut slot = lock(&self.inner.cycle);
        if let Some((_, token)) = &slot.active {
            if !token.is_cancelled() {
                return None;
            }
        }
        if let Some((_, stale)) = slot.active.take() {
            stale.cancel();
        }

        let token = self.inner.shutdown.child_token();
        slot.next_id += 1;
        let id = slot.next_id;
        slot.active = Some((id, token.clone()));

        Some(ActiveCycle {
            slot: Arc::clone(&self.inner.cycle),
            id,
            token,
        })
    }

    fn cancel_active(&self) {
        if let Some((_, token)) = &lock(&self.inner.cycle).active {
            token.cancel();
        }
    }

    async fn run_cycle(
        &self,
        cycle: &ActiveCycle,
        trigger: RefreshTrigger,
    ) -> Result<Vec<ServerRecord>> {
        let state = if trigger == RefreshTrigger::Initial {
            RefreshState::Loading
        } else {
            RefreshState::Refreshing(trigger)
        };
        self.publish(&cycle.token, |view| view.state = state);

        match self.cycle_body(&cycle.token).await {
            Ok(servers) => {
                tracing::info!("Refreshed {} server(s) ({:?})", servers.len(), trigger);
                self.publish(&cycle.token, |view| {
                    view.servers.clone_from(&servers);
                    view.notice = None;
                    view.state = RefreshState::Idle;
                    view.last_refreshed_at = Some(Utc::now());
                });
                Ok(servers)
            }
            Err(Error::Cancelled) => {
                tracing::debug!("Discarding results of a cancelled cycle ({:?})", trigger);
                Err(Error::Cancelled)
            }
            Err(error) => {
                tracing::warn!("Failed to load servers: {}", error);
                let notice = Notice::from(&error);
                self.publish(&cycle.token, |view| {
                    view.notice = Some(notice);
                    view.state = RefreshState::Idle;
                });
                Err(error)
            }
        }
    }

    async fn cycle_body(&self, token: &CancellationToken) -> Result<Vec<ServerRecord>> {
        let Some(owner_id) = self.inner.session.current_user_id() else {
            return Ok(Vec::new());
        };

        let servers = tokio::select! {
            biased;
            () = token.cancelled() => return Err(Error::Cancelled),
            listed = self.inner.store.list(&owner_id) => listed?,
        };

        let merged = self.inner.reconciler.reconcile(servers, token).await;
        if token.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(merged)
    }

    /// Apply `update` to the published view unless `token` is cancelled.
    ///
    /// The check runs under the channel lock, so a cycle cancelled by a
    /// concurrent session change can never overwrite the view published for it.
    /// Cycle tokens are children of the shutdown token.
    fn publish(&self, token: &CancellationToken, update: impl FnOnce(&mut DashboardView)) {
        self.inner.view.send_if_modified(|view| {
            if token.is_cancelled() {
                return false;
            }
            update(view);
            true
        });
    }
}

fn signed_in_user(sessions: &mut watch::Receiver<Option<AuthSession>>) -> Option<String> {
    sessions
        .borrow_and_update()
        .as_ref()
        .map(|session| session.user.id.clone())
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
