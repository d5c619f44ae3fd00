// ============================================================================
// Access Control
// ============================================================================
//
// Two layers with different shapes:
//
// - Route gates ([`gates`]) answer "may this surface render" with a
//   three-way [`GateDecision`], because an unresolved session must hold the
//   surface blank instead of bouncing the user to a login page they do not
//   need.
// - Service guards answer "may this actor do this" with an [`AccessError`],
//   because by the time an action fires the session is resolved.
//
// ============================================================================

pub mod developer;
pub mod gates;

use crate::domain::user::Role;

pub use developer::{DeveloperGate, SessionFlags};
pub use gates::{AuthGate, Destination, GateDecision, RoleGate, RoleState, RouteGate};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("not signed in")]
    NotAuthenticated,

    #[error("role {role} may not perform this action")]
    Forbidden { role: Role },

    #[error("the developer console requires the access secret")]
    SecretRequired,

    #[error("wrong developer console secret")]
    BadSecret,
}
