//! Authentication seam.
//!
//! The platform does not implement credentials itself; an [`AuthProvider`]
//! answers "who is signed in". Resolution is asynchronous, and every surface
//! has to cope with the window where the answer is not in yet. That window
//! is the [`AuthState::Loading`] variant, which the gates treat as "hold,
//! don't redirect".

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use uuid::Uuid;

/// The signed-in identity, before any profile lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthState {
    /// Resolution still in flight. Gates render nothing yet.
    Loading,
    SignedOut,
    SignedIn(AuthUser),
}

impl AuthState {
    pub fn user(&self) -> Option<&AuthUser> {
        match self {
            Self::SignedIn(user) => Some(user),
            Self::Loading | Self::SignedOut => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Loading)
    }
}

impl Default for AuthState {
    fn default() -> Self {
        Self::SignedOut
    }
}

#[async_trait]
pub trait AuthProvider: Send + Sync + 'static {
    /// Waits for the provider to know whether someone is signed in. The
    /// returned state is always resolved, never [`AuthState::Loading`].
    async fn resolve(&self) -> AuthState;

    async fn sign_out(&self);
}

/// An [`AuthProvider`] whose answer is set by the caller. The demo binary
/// uses it to walk through the personas; tests use it to pin a session to a
/// known user.
#[derive(Clone, Default)]
pub struct ScriptedAuth {
    state: Arc<Mutex<AuthState>>,
}

impl ScriptedAuth {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(id: Uuid, email: &str) -> Self {
        let auth = Self::default();
        auth.sign_in(AuthUser {
            id,
            email: email.to_string(),
        });
        auth
    }

    pub fn sign_in(&self, user: AuthUser) {
        *self.lock() = AuthState::SignedIn(user);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl AuthProvider for ScriptedAuth {
    async fn resolve(&self) -> AuthState {
        self.lock().clone()
    }

    async fn sign_out(&self) {
        *self.lock() = AuthState::SignedOut;
    }
}
