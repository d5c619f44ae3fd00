use std::fmt;

use crate::auth::AuthState;
use crate::domain::user::Role;

// ============================================================================
// Route Gates
// ============================================================================

/// Where a redirect sends the user, e.g. `/login` or `/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination(String);

impl Destination {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The outcome of evaluating a gate against the current session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Render the protected surface.
    Allow,
    /// Session still resolving; render nothing, never the protected content.
    Pending,
    /// Send the user elsewhere.
    Redirect(Destination),
}

impl GateDecision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// What the session knows about the user's role. Distinct from
/// [`AuthState`]: a user can be signed in while the profile read is still in
/// flight, and a signed-in user may turn out to have no usable profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoleState {
    /// Profile read still in flight.
    Loading,
    /// No profile document, or one with an unknown role string.
    Missing,
    Known(Role),
}

/// First gate on every protected route: is anyone signed in at all?
#[derive(Debug, Clone)]
pub struct AuthGate {
    sign_in: Destination,
}

impl AuthGate {
    pub fn new(sign_in: Destination) -> Self {
        Self { sign_in }
    }

    pub fn evaluate(&self, auth: &AuthState) -> GateDecision {
        match auth {
            AuthState::Loading => GateDecision::Pending,
            AuthState::SignedOut => GateDecision::Redirect(self.sign_in.clone()),
            AuthState::SignedIn(_) => GateDecision::Allow,
        }
    }
}

/// Second gate: is the signed-in user's role on this route's allow-list?
#[derive(Debug, Clone)]
pub struct RoleGate {
    allowed: Vec<Role>,
    fallback: Destination,
}

impl RoleGate {
    pub fn new(allowed: &[Role], fallback: Destination) -> Self {
        Self {
            allowed: allowed.to_vec(),
            fallback,
        }
    }

    pub fn evaluate(&self, role: RoleState) -> GateDecision {
        match role {
            RoleState::Loading => GateDecision::Pending,
            RoleState::Missing => GateDecision::Redirect(self.fallback.clone()),
            RoleState::Known(role) => {
                if self.allowed.contains(&role) {
                    GateDecision::Allow
                } else {
                    GateDecision::Redirect(self.fallback.clone())
                }
            }
        }
    }
}

/// Auth gate and optional role gate composed in order. The role gate is only
/// consulted once the auth gate allows, so a signed-out user is redirected to
/// sign-in rather than the role fallback.
#[derive(Debug, Clone)]
pub struct RouteGate {
    auth: AuthGate,
    role: Option<RoleGate>,
}

impl RouteGate {
    pub fn authenticated(sign_in: Destination) -> Self {
        Self {
            auth: AuthGate::new(sign_in),
            role: None,
        }
    }

    pub fn with_roles(mut self, allowed: &[Role], fallback: Destination) -> Self {
        self.role = Some(RoleGate::new(allowed, fallback));
        self
    }

    pub fn evaluate(&self, auth: &AuthState, role: RoleState) -> GateDecision {
        match self.auth.evaluate(auth) {
            GateDecision::Allow => {}
            held => return held,
        }
        match &self.role {
            Some(gate) => gate.evaluate(role),
            None => GateDecision::Allow,
        }
    }
}
