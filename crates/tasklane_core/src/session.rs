//! Authentication session state.
//!
//! # Responsibility
//! - Resolve the backend session once at startup.
//! - Mirror backend auth-change events into observable state for the rest of
//!   the process.
//! - Delegate sign-up/sign-in/sign-out, passing backend failures through.
//!
//! # Invariants
//! - `loading` starts `true` and flips to `false` exactly once, after the
//!   initial fetch settles, whether it succeeded or not.
//! - After initialization the auth-change listener is the only writer of
//!   `user`; sign-in and sign-out never assign it directly.

use crate::backend::{AuthApi, AuthChangeEvent, BackendError, Row};
use crate::error::{SyncError, SyncResult};
use crate::model::user::{AuthResponse, AuthSession, User, USERNAME_METADATA_KEY};
use log::{debug, error, info, warn};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;

/// Snapshot of the process authentication state.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionState {
    pub user: Option<User>,
    /// `true` until the initial session fetch settles.
    pub loading: bool,
}

impl SessionState {
    fn starting() -> Self {
        Self {
            user: None,
            loading: true,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

/// Subscription to session state changes. Dropping it unsubscribes.
pub struct SessionWatch {
    receiver: watch::Receiver<SessionState>,
}

impl SessionWatch {
    pub fn current(&self) -> SessionState {
        self.receiver.borrow().clone()
    }

    /// Waits for the next state change. `None` once the manager is gone.
    pub async fn changed(&mut self) -> Option<SessionState> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Resolves with the first state where initialization has settled.
    pub async fn ready(&mut self) -> SessionState {
        if let Ok(state) = self.receiver.wait_for(|state| !state.loading).await {
            return state.clone();
        }
        self.receiver.borrow().clone()
    }
}

/// Owner of the process authentication state.
pub struct SessionManager<B: AuthApi + ?Sized> {
    backend: Arc<B>,
    state: Arc<watch::Sender<SessionState>>,
    initialized: AtomicBool,
}

impl<B: AuthApi + ?Sized> SessionManager<B> {
    /// Creates a manager in the `loading` state. Call [`Self::initialize`] once.
    pub fn new(backend: Arc<B>) -> Self {
        let (sender, _) = watch::channel(SessionState::starting());
        Self {
            backend,
            state: Arc::new(sender),
            initialized: AtomicBool::new(false),
        }
    }

    /// Resolves the current backend session and subscribes to auth changes.
    ///
    /// Never fails observably: a failed fetch is logged and leaves the process
    /// unauthenticated. The subscription is installed either way so a later
    /// sign-in is still observed. Repeated calls are no-ops.
    pub async fn initialize(&self) {
        if self.initialized.swap(true, Ordering::SeqCst) {
            debug!("event=session_init module=session status=skipped reason=already_initialized");
            return;
        }

        let started_at = Instant::now();
        info!("event=session_init module=session status=start");

        match self.backend.get_session().await {
            Ok(session) => {
                let user = session.map(|session| session.user);
                info!(
                    "event=session_init module=session status=ok authenticated={} duration_ms={}",
                    user.is_some(),
                    started_at.elapsed().as_millis()
                );
                self.state.send_modify(|state| state.user = user);
            }
            Err(err) => {
                error!(
                    "event=session_init module=session status=error duration_ms={} error_code={} error={}",
                    started_at.elapsed().as_millis(),
                    err.code,
                    err
                );
            }
        }

        let sender = Arc::clone(&self.state);
        self.backend
            .on_session_change(Box::new(move |event, session| {
                apply_auth_change(&sender, event, session);
            }));

        self.state.send_modify(|state| state.loading = false);
    }

    pub fn subscribe(&self) -> SessionWatch {
        SessionWatch {
            receiver: self.state.subscribe(),
        }
    }

    /// Suspends until initialization has settled, then returns the state.
    pub async fn wait_until_ready(&self) -> SessionState {
        let mut watch = self.subscribe();
        watch.ready().await
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().user.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.borrow().is_authenticated()
    }

    /// Registers a new account. `user` is updated by the auth-change listener.
    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> SyncResult<AuthResponse> {
        let mut metadata = Row::new();
        metadata.insert(
            USERNAME_METADATA_KEY.to_string(),
            Value::String(username.to_string()),
        );
        self.backend
            .sign_up(email, password, metadata)
            .await
            .map_err(|err| auth_failure("sign_up", err))
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> SyncResult<AuthResponse> {
        self.backend
            .sign_in_with_password(email, password)
            .await
            .map_err(|err| auth_failure("sign_in", err))
    }

    pub async fn sign_out(&self) -> SyncResult<()> {
        self.backend
            .sign_out()
            .await
            .map_err(|err| auth_failure("sign_out", err))
    }
}

fn apply_auth_change(
    state: &watch::Sender<SessionState>,
    event: AuthChangeEvent,
    session: Option<&AuthSession>,
) {
    let user = session.map(|session| session.user.clone());
    info!(
        "event=auth_change module=session status=ok kind={} authenticated={}",
        event.as_str(),
        user.is_some()
    );
    state.send_modify(|state| state.user = user);
}

fn auth_failure(operation: &str, err: BackendError) -> SyncError {
    warn!(
        "event=auth_{operation} module=session status=error error_code={} error={}",
        err.code, err
    );
    SyncError::Remote(err)
}

#[cfg(test)]
mod tests {
    use super::{apply_auth_change, SessionState};
    use crate::backend::AuthChangeEvent;
    use crate::model::user::{AuthSession, User};
    use chrono::Utc;
    use serde_json::Map;
    use tokio::sync::watch;
    use uuid::Uuid;

    fn session() -> AuthSession {
        AuthSession {
            access_token: "token".to_string(),
            user: User {
                id: Uuid::new_v4(),
                email: "ada@example.com".to_string(),
                user_metadata: Map::new(),
                created_at: Utc::now(),
            },
            expires_at: None,
        }
    }

    #[test]
    fn starts_loading_and_unauthenticated() {
        let state = SessionState::starting();
        assert!(state.loading);
        assert!(!state.is_authenticated());
    }

    #[test]
    fn auth_change_replaces_user_without_touching_loading() {
        let (sender, receiver) = watch::channel(SessionState::starting());
        let session = session();

        apply_auth_change(&sender, AuthChangeEvent::SignedIn, Some(&session));
        assert_eq!(receiver.borrow().user.as_ref().map(|u| u.id), Some(session.user.id));
        assert!(receiver.borrow().loading);

        apply_auth_change(&sender, AuthChangeEvent::SignedOut, None);
        assert!(receiver.borrow().user.is_none());
    }
}
