use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::restaurant::Restaurant;
use super::user::UserProfile;
use crate::store::collections::HIRING_REQUESTS;
use crate::store::document::{self, Document};
use crate::store::StoreError;

// ============================================================================
// Hiring Workflow
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HiringError {
    #[error("this request was already {decided}")]
    AlreadyDecided { decided: HiringStatus },

    #[error("a pending request to this restaurant already exists")]
    AlreadyPending,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HiringStatus {
    Pending,
    Accepted,
    Rejected,
}

impl HiringStatus {
    pub fn is_decided(&self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for HiringStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A courier's application to work for a restaurant. Names are denormalized
/// in so both inboxes render without extra lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiringRequest {
    pub id: Uuid,
    pub courier_id: Uuid,
    pub courier_name: String,
    pub restaurant_id: Uuid,
    pub restaurant_name: String,
    pub status: HiringStatus,
    pub created_at: DateTime<Utc>,
}

impl HiringRequest {
    pub fn submit(courier: &UserProfile, restaurant: &Restaurant, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            courier_id: courier.id,
            courier_name: courier.display_name().to_string(),
            restaurant_id: restaurant.id,
            restaurant_name: restaurant.name.clone(),
            status: HiringStatus::Pending,
            created_at: now,
        }
    }

    /// Settles the request. Each request is decided exactly once; a second
    /// decision fails no matter which way the first one went.
    pub fn decide(&mut self, accept: bool) -> Result<(), HiringError> {
        match self.status {
            HiringStatus::Pending => {
                self.status = if accept {
                    HiringStatus::Accepted
                } else {
                    HiringStatus::Rejected
                };
                Ok(())
            }
            decided @ (HiringStatus::Accepted | HiringStatus::Rejected) => {
                Err(HiringError::AlreadyDecided { decided })
            }
        }
    }

    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        document::from_document(HIRING_REQUESTS, doc)
    }

    pub fn to_document(&self) -> Result<Document, StoreError> {
        document::to_document(HIRING_REQUESTS, self)
    }
}
