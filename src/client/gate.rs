//! Client-side authentication gate.
//!
//! The gate owns the single observable authentication state. It starts
//! unresolved, is hydrated from a [`TokenStore`], flips to authenticated on
//! sign-in and back on sign-out or on a `401` answering the current token.
//! Route guards read the state once per navigation.

use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::token_store::{StoredSession, TokenStore};
use crate::model::User;

pub const LOGIN_ROUTE: &str = "/login";
pub const DEFAULT_LANDING_ROUTE: &str = "/dashboard";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    Authenticated { token: String, user: User },
}

impl AuthState {
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    #[must_use]
    pub fn token(&self) -> Option<&str> {
        match self {
            Self::Authenticated { token, .. } => Some(token),
            Self::Unauthenticated => None,
        }
    }

    #[must_use]
    pub fn user(&self) -> Option<&User> {
        match self {
            Self::Authenticated { user, .. } => Some(user),
            Self::Unauthenticated => None,
        }
    }
}

/// Where the guards run. Server-side rendering has no stored session, so
/// guards there never block.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderContext {
    Server,
    Browser,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteGuard {
    /// Only signed-in users may enter; others go to the login page.
    RequireAuth,
    /// Only anonymous users may enter; signed-in users go to the landing page.
    GuestOnly,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardOutcome {
    Allow,
    Redirect(&'static str),
}

impl RouteGuard {
    #[must_use]
    pub fn evaluate(self, state: &AuthState) -> GuardOutcome {
        match (self, state.is_authenticated()) {
            (Self::RequireAuth, false) => GuardOutcome::Redirect(LOGIN_ROUTE),
            (Self::GuestOnly, true) => GuardOutcome::Redirect(DEFAULT_LANDING_ROUTE),
            _ => GuardOutcome::Allow,
        }
    }
}

/// Cloneable handle on the shared authentication state.
#[derive(Clone)]
pub struct AuthGate {
    // `None` until hydration publishes the first definitive state.
    state: Arc<watch::Sender<Option<AuthState>>>,
    store: Arc<dyn TokenStore>,
    context: RenderContext,
}

impl AuthGate {
    #[must_use]
    pub fn new(store: Arc<dyn TokenStore>, context: RenderContext) -> Self {
        let (state, _) = watch::channel(None);
        Self {
            state: Arc::new(state),
            store,
            context,
        }
    }

    #[must_use]
    pub const fn context(&self) -> RenderContext {
        self.context
    }

    /// Publish the persisted session, if any. A store that cannot be read
    /// leaves the user signed out.
    pub async fn hydrate(&self) -> AuthState {
        let state = match self.store.load().await {
            Ok(Some(StoredSession { token, user })) => AuthState::Authenticated { token, user },
            Ok(None) => AuthState::Unauthenticated,
            Err(err) => {
                warn!("Failed to load stored session: {err:#}");
                AuthState::Unauthenticated
            }
        };
        debug!(authenticated = state.is_authenticated(), "auth state hydrated");
        self.publish(state.clone());
        state
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        self.state.borrow().is_some()
    }

    /// Current state; unresolved reads as signed out.
    #[must_use]
    pub fn current(&self) -> AuthState {
        self.state
            .borrow()
            .clone()
            .unwrap_or(AuthState::Unauthenticated)
    }

    #[must_use]
    pub fn token(&self) -> Option<String> {
        self.state
            .borrow()
            .as_ref()
            .and_then(AuthState::token)
            .map(ToString::to_string)
    }

    /// Observe state changes; `None` means not yet resolved.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<AuthState>> {
        self.state.subscribe()
    }

    /// Wait for the first definitive state. On the server nothing is ever
    /// hydrated, so the current value is returned immediately.
    pub async fn resolve(&self) -> AuthState {
        if self.context == RenderContext::Server {
            return self.current();
        }
        let mut receiver = self.state.subscribe();
        let state = match receiver.wait_for(Option::is_some).await {
            Ok(state) => state.clone().unwrap_or(AuthState::Unauthenticated),
            // The sender lives in `self`, so it cannot be dropped here.
            Err(_) => self.current(),
        };
        state
    }

    /// Run a guard against a single read of the state.
    pub async fn check(&self, guard: RouteGuard) -> GuardOutcome {
        if self.context == RenderContext::Server {
            return GuardOutcome::Allow;
        }
        let state = self.resolve().await;
        guard.evaluate(&state)
    }

    pub async fn sign_in(&self, token: String, user: User) {
        let session = StoredSession { token, user };
        if let Err(err) = self.store.save(&session).await {
            warn!("Failed to persist session: {err:#}");
        }
        self.publish(AuthState::Authenticated {
            token: session.token,
            user: session.user,
        });
    }

    pub async fn sign_out(&self) {
        if let Err(err) = self.store.clear().await {
            warn!("Failed to clear stored session: {err:#}");
        }
        self.publish(AuthState::Unauthenticated);
    }

    /// Sign out only if `token` is still the current session's token. A
    /// rejection of an older token must not end a newer session. Returns
    /// whether the state changed.
    pub async fn sign_out_token(&self, token: &str) -> bool {
        let revoked = self.state.send_if_modified(|state| {
            let current = state.as_ref().and_then(AuthState::token);
            if current == Some(token) {
                *state = Some(AuthState::Unauthenticated);
                true
            } else {
                false
            }
        });
        if revoked {
            if let Err(err) = self.store.clear().await {
                warn!("Failed to clear stored session: {err:#}");
            }
        } else {
            debug!("ignoring rejection of a superseded token");
        }
        revoked
    }

    /// Refresh the user of the current session without touching the token.
    pub async fn update_user(&self, user: User) {
        if let Some(token) = self.token() {
            self.sign_in(token, user).await;
        }
    }

    fn publish(&self, state: AuthState) {
        self.state.send_replace(Some(state));
    }
}

impl std::fmt::Debug for AuthGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthGate")
            .field("context", &self.context)
            .field("authenticated", &self.current().is_authenticated())
            .finish_non_exhaustive()
    }
}
