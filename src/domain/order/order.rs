use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use super::value_objects::{FeeBreakdown, OrderLine, OrderStatus, PaymentMethod};
use crate::domain::geo::GeoPoint;
use crate::store::collections::ORDERS;
use crate::store::document::{self, Document};
use crate::store::StoreError;

// ============================================================================
// Order Entity
// ============================================================================

/// A placed order. Everything monetary in here is a frozen snapshot taken at
/// submission; the only fields that ever change afterwards are `status` and
/// `updated_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub restaurant_id: Uuid,
    pub items: Vec<OrderLine>,
    #[serde(flatten)]
    pub fees: FeeBreakdown,
    pub status: OrderStatus,
    pub address: String,
    pub location: GeoPoint,
    #[serde(default)]
    pub payment_method: PaymentMethod,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Creates a freshly submitted order in `pending`.
    #[allow(clippy::too_many_arguments)]
    pub fn place(
        customer_id: Uuid,
        restaurant_id: Uuid,
        items: Vec<OrderLine>,
        fees: FeeBreakdown,
        address: String,
        location: GeoPoint,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            restaurant_id,
            items,
            fees,
            status: OrderStatus::Pending,
            address,
            location,
            payment_method: PaymentMethod::CashOnDelivery,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a status change after validating it against the lifecycle
    /// rules. On success only `status` and `updated_at` are touched.
    pub fn transition(&mut self, to: OrderStatus, now: DateTime<Utc>) -> Result<(), OrderError> {
        self.status.validate_transition(to)?;
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn from_document(doc: &Document) -> Result<Self, StoreError> {
        document::from_document(ORDERS, doc)
    }

    pub fn to_document(&self) -> Result<Document, StoreError> {
        document::to_document(ORDERS, self)
    }
}
