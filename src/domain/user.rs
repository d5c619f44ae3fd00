use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthUser;
use crate::store::collections::USERS;
use crate::store::document::{self, Document};
use crate::store::StoreError;

// ============================================================================
// Roles
// ============================================================================

/// The closed set of platform roles. Every role-conditional branch in the
/// codebase matches on this enum exhaustively, so adding a variant forces a
/// decision at each gated surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Owner,
    Courier,
    Admin,
    Developer,
}

impl Role {
    /// Parses the stored role string. Unknown strings are rejected, never
    /// coerced to a default.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "customer" => Some(Self::Customer),
            "owner" => Some(Self::Owner),
            "courier" => Some(Self::Courier),
            "admin" => Some(Self::Admin),
            "developer" => Some(Self::Developer),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Customer => "customer",
            Self::Owner => "owner",
            Self::Courier => "courier",
            Self::Admin => "admin",
            Self::Developer => "developer",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Profiles
// ============================================================================

/// An authenticated user joined with their stored profile document.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub name: Option<String>,
    pub role: Role,
}

impl UserProfile {
    /// Builds a profile from the auth identity plus the `users/{id}` document.
    /// A missing or unknown role rejects the whole document; the session then
    /// treats the user as having no profile rather than guessing a role.
    pub fn from_document(auth: &AuthUser, doc: &Document) -> Result<Self, StoreError> {
        let raw_role = document::get_str(doc, "role")
            .ok_or_else(|| StoreError::decode(USERS, "role field missing"))?;
        let role = Role::parse(raw_role)
            .ok_or_else(|| StoreError::decode(USERS, format!("unknown role `{raw_role}`")))?;
        Ok(Self {
            id: auth.id,
            email: document::get_string(doc, "email").unwrap_or_else(|| auth.email.clone()),
            name: document::get_string(doc, "name"),
            role,
        })
    }

    pub fn to_document(&self) -> Document {
        let mut doc = Document::new();
        doc.insert("role".into(), self.role.as_str().into());
        doc.insert("email".into(), self.email.clone().into());
        if let Some(name) = &self.name {
            doc.insert("name".into(), name.clone().into());
        }
        doc
    }

    /// What hiring requests and order views display for this user.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.email)
    }
}
