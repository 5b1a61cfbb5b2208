//! Session state machine.
//!
//! [`SessionStore`] holds the session token and the current user, persists
//! the token through a [`TokenVault`], and publishes every change on
//! broadcast channels:
//!
//! - session changes (`bool`, whether a session is active)
//! - user changes (`Option<U>`)
//! - bootstrap user-fetch failures
//!
//! Reads are lock-light and callable from any thread. Mutations are
//! serialized by a single writer lock, held until the notifications for
//! that mutation have been sent, so observers see state and notifications
//! in the same order.

use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tidewire_core::{
    AuthenticableUser, CurrentUserFetcher, RepositoryError, SessionError, SessionManager,
};
use tidewire_fetch::KeychainApi;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::token_vault::TokenVault;

/// Buffered notifications per channel before slow receivers lag.
const CHANNEL_CAPACITY: usize = 16;

// ============================================================================
// Inner State
// ============================================================================

struct SessionState<U> {
    token: Option<String>,
    user: Option<U>,
    last_changed: Option<DateTime<Utc>>,
}

impl<U> Default for SessionState<U> {
    fn default() -> Self {
        Self {
            token: None,
            user: None,
            last_changed: None,
        }
    }
}

// ============================================================================
// Bootstrap Report
// ============================================================================

/// Outcome of [`SessionStore::bootstrap`].
#[derive(Debug)]
pub struct BootstrapReport {
    /// Whether a persisted session was restored.
    pub restored: bool,
    /// The background user fetch, if one was started.
    pub user_fetch: Option<JoinHandle<()>>,
}

impl BootstrapReport {
    /// Whether a user fetch was started.
    pub fn user_fetch_started(&self) -> bool {
        self.user_fetch.is_some()
    }

    /// Waits for the background user fetch, if any, to finish.
    pub async fn wait(self) {
        if let Some(handle) = self.user_fetch {
            if let Err(e) = handle.await {
                warn!(error = %e, "User fetch task did not complete");
            }
        }
    }
}

// ============================================================================
// Session Store
// ============================================================================

/// Session state for users of type `U`.
///
/// Create one per process at the composition root, wrap it in an `Arc`,
/// and hand it to repositories as their [`SessionManager`].
pub struct SessionStore<U> {
    state: RwLock<SessionState<U>>,
    writer: Mutex<()>,
    vault: TokenVault,
    fetcher: RwLock<Option<Weak<dyn CurrentUserFetcher<U>>>>,
    session_tx: broadcast::Sender<bool>,
    user_tx: broadcast::Sender<Option<U>>,
    bootstrap_error_tx: broadcast::Sender<Arc<RepositoryError>>,
}

impl<U> std::fmt::Debug for SessionStore<U> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        f.debug_struct("SessionStore")
            .field("logged_in", &state.token.is_some())
            .field("has_user", &state.user.is_some())
            .field("last_changed", &state.last_changed)
            .finish_non_exhaustive()
    }
}

impl<U> SessionStore<U>
where
    U: AuthenticableUser + Clone + Send + Sync + 'static,
{
    /// Creates a logged-out store persisting through `keychain`.
    ///
    /// Call [`SessionStore::bootstrap`] to restore a persisted session.
    pub fn new(keychain: Arc<dyn KeychainApi>) -> Self {
        let (session_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (user_tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        let (bootstrap_error_tx, _) = broadcast::channel(CHANNEL_CAPACITY);

        Self {
            state: RwLock::new(SessionState::default()),
            writer: Mutex::new(()),
            vault: TokenVault::new(keychain),
            fetcher: RwLock::new(None),
            session_tx,
            user_tx,
            bootstrap_error_tx,
        }
    }

    // ========================================================================
    // Observation
    // ========================================================================

    /// Returns true if a session is active.
    pub fn is_logged_in(&self) -> bool {
        self.read().token.is_some()
    }

    /// The active session token.
    pub fn session_token(&self) -> Option<String> {
        self.read().token.clone()
    }

    /// The current user, once known.
    pub fn current_user(&self) -> Option<U> {
        self.read().user.clone()
    }

    /// When the session state last changed.
    pub fn last_changed(&self) -> Option<DateTime<Utc>> {
        self.read().last_changed
    }

    /// Subscribes to session changes. Each value says whether a session
    /// is active.
    pub fn subscribe_session(&self) -> broadcast::Receiver<bool> {
        self.session_tx.subscribe()
    }

    /// Subscribes to user changes.
    pub fn subscribe_user(&self) -> broadcast::Receiver<Option<U>> {
        self.user_tx.subscribe()
    }

    /// Subscribes to failures of the bootstrap user fetch.
    pub fn subscribe_bootstrap_errors(&self) -> broadcast::Receiver<Arc<RepositoryError>> {
        self.bootstrap_error_tx.subscribe()
    }

    /// Registers the collaborator used by [`SessionStore::bootstrap`] to
    /// fetch the user of a restored session.
    ///
    /// Only a weak reference is kept; the caller owns the fetcher.
    pub fn set_current_user_fetcher<F>(&self, fetcher: &Arc<F>)
    where
        F: CurrentUserFetcher<U> + 'static,
    {
        let weak: Weak<dyn CurrentUserFetcher<U>> = Arc::downgrade(fetcher) as Weak<F>;
        *self.fetcher.write().unwrap_or_else(PoisonError::into_inner) = Some(weak);
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Restores the persisted session.
    ///
    /// Emits the resulting login state on the session channel exactly
    /// once, and a user change if a previous user was cleared. When a session was restored and a fetcher is registered, the
    /// user is fetched in the background; success emits a user change,
    /// failure is logged and published on the bootstrap error channel.
    #[instrument(skip(self))]
    pub async fn bootstrap(self: &Arc<Self>) -> BootstrapReport {
        let restored = {
            let _writer = self.writer.lock().await;

            let token = match self.vault.load().await {
                Ok(token) => token,
                Err(e) => {
                    warn!(error = %e, "Could not read persisted session, starting logged out");
                    None
                }
            };
            let restored = token.is_some();
            let had_user = self.read().user.is_some();
            self.replace(token, None);
            let _ = self.session_tx.send(restored);
            if had_user {
                let _ = self.user_tx.send(None);
            }
            restored
        };

        let user_fetch = if restored {
            self.spawn_user_fetch()
        } else {
            None
        };

        info!(
            restored,
            fetching_user = user_fetch.is_some(),
            "Session bootstrapped"
        );
        BootstrapReport {
            restored,
            user_fetch,
        }
    }

    /// Starts a session for `user` and persists its token.
    ///
    /// Emits a session change (`true`) and a user change.
    #[instrument(skip(self, user))]
    pub async fn login(&self, user: U) -> Result<(), SessionError> {
        let _writer = self.writer.lock().await;

        if self.is_logged_in() {
            return Err(SessionError::AlreadyAuthenticated);
        }
        let token = user
            .session_token()
            .ok_or(SessionError::MissingToken)?
            .to_string();

        self.vault.save(&token).await?;
        self.replace(Some(token), Some(user.clone()));

        let _ = self.session_tx.send(true);
        let _ = self.user_tx.send(Some(user));
        info!("Logged in");
        Ok(())
    }

    /// Replaces the current user and token in place.
    ///
    /// The login state does not change, so only a user change is emitted.
    #[instrument(skip(self, user))]
    pub async fn update(&self, user: U) -> Result<(), SessionError> {
        let _writer = self.writer.lock().await;

        let Some(current) = self.session_token() else {
            return Err(SessionError::NotAuthenticated);
        };
        let token = user
            .session_token()
            .ok_or(SessionError::MissingToken)?
            .to_string();

        if token != current {
            self.vault.save(&token).await?;
            debug!("Session token rotated");
        }
        self.replace(Some(token), Some(user.clone()));

        let _ = self.user_tx.send(Some(user));
        debug!("Current user updated");
        Ok(())
    }

    /// Ends the session at the user's request.
    #[instrument(skip(self))]
    pub async fn logout(&self) -> Result<(), SessionError> {
        self.end_session("logged out").await
    }

    /// Ends the session because the server rejected its token.
    ///
    /// Same effect as [`SessionStore::logout`]. Repositories call this
    /// through [`SessionManager::expire`].
    #[instrument(skip(self))]
    pub async fn expire(&self) -> Result<(), SessionError> {
        self.end_session("expired").await
    }

    // ========================================================================
    // Internals
    // ========================================================================

    async fn end_session(&self, reason: &str) -> Result<(), SessionError> {
        let _writer = self.writer.lock().await;

        if !self.is_logged_in() {
            return Err(SessionError::NotAuthenticated);
        }

        self.vault.clear().await?;
        self.replace(None, None);

        let _ = self.session_tx.send(false);
        let _ = self.user_tx.send(None);
        info!(reason, "Session ended");
        Ok(())
    }

    fn spawn_user_fetch(self: &Arc<Self>) -> Option<JoinHandle<()>> {
        let fetcher = self
            .fetcher
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .and_then(Weak::upgrade);
        let Some(fetcher) = fetcher else {
            debug!("No current user fetcher registered");
            return None;
        };
        let token = self.session_token()?;
        let store = Arc::downgrade(self);

        Some(tokio::spawn(async move {
            let result = fetcher.fetch_current_user().await;
            drop(fetcher);

            match store.upgrade() {
                Some(store) => store.finish_user_fetch(&token, result).await,
                None => debug!("Session store dropped during user fetch"),
            }
        }))
    }

    async fn finish_user_fetch(&self, token: &str, result: Result<U, RepositoryError>) {
        let user = match result {
            Ok(user) => user,
            Err(e) => {
                warn!(error = %e, "Failed to fetch current user");
                let _ = self.bootstrap_error_tx.send(Arc::new(e));
                return;
            }
        };

        let _writer = self.writer.lock().await;
        let accepted = {
            let mut state = self.write();
            if state.token.as_deref() == Some(token) {
                state.user = Some(user.clone());
                state.last_changed = Some(Utc::now());
                true
            } else {
                false
            }
        };

        if accepted {
            let _ = self.user_tx.send(Some(user));
            debug!("Current user fetched");
        } else {
            debug!("Session changed during user fetch, discarding user");
        }
    }

    fn replace(&self, token: Option<String>, user: Option<U>) {
        let mut state = self.write();
        state.token = token;
        state.user = user;
        state.last_changed = Some(Utc::now());
    }

    fn read(&self) -> RwLockReadGuard<'_, SessionState<U>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SessionState<U>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl<U> SessionManager for SessionStore<U>
where
    U: AuthenticableUser + Clone + Send + Sync + 'static,
{
    fn is_logged_in(&self) -> bool {
        SessionStore::is_logged_in(self)
    }

    fn session_token(&self) -> Option<String> {
        SessionStore::session_token(self)
    }

    async fn expire(&self) -> Result<(), SessionError> {
        SessionStore::expire(self).await
    }
}

// ============================================================================
// Tests
// ============================================================================
