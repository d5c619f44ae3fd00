use std::fmt;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::OrderError;
use crate::domain::cart::CartLine;

/// Rounds a monetary amount to 2 decimal places, half away from zero.
/// Every derived amount passes through here before being stored or shown.
pub fn round2(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

// ============================================================================
// Order Value Objects
// ============================================================================

/// The fulfilment path. Transitions only move rightward along
/// `pending → accepted → preparing → ready → out_for_delivery → delivered`,
/// with `cancelled` reachable from any non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Accepted,
    Preparing,
    Ready,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 7] = [
        OrderStatus::Pending,
        OrderStatus::Accepted,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
        OrderStatus::Cancelled,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Cancelled)
    }

    /// Position on the forward path. `cancelled` sits outside the path and
    /// has no rank.
    fn rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Accepted => Some(1),
            Self::Preparing => Some(2),
            Self::Ready => Some(3),
            Self::OutForDelivery => Some(4),
            Self::Delivered => Some(5),
            Self::Cancelled => None,
        }
    }

    /// Checks whether an order currently in `self` may move to `to`.
    /// Skipping ahead is allowed (a kitchen may mark `ready` straight from
    /// `pending`); moving backwards or out of a terminal status is not.
    pub fn validate_transition(&self, to: OrderStatus) -> Result<(), OrderError> {
        if self.is_terminal() {
            return Err(OrderError::TerminalState { current: *self });
        }
        if *self == to {
            return Err(OrderError::AlreadyInStatus { status: to });
        }
        if to == OrderStatus::Cancelled {
            return Ok(());
        }
        match (self.rank(), to.rank()) {
            (Some(from), Some(target)) if target > from => Ok(()),
            _ => Err(OrderError::BackwardTransition {
                current: *self,
                requested: to,
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    CashOnDelivery,
}

/// One ordered line, copied out of the cart at submission. Prices live here,
/// not in the menu: menu edits after submission never reprice an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    pub item_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub qty: u32,
}

impl OrderLine {
    pub fn from_cart_line(line: &CartLine) -> Self {
        Self {
            item_id: line.item_id,
            name: line.name.clone(),
            unit_price: line.unit_price,
            qty: line.qty,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.qty)
    }
}

/// The monetary snapshot frozen into an order at submission time.
///
/// `commission_rate` is the live platform rate *as read at that moment*;
/// recomputing any of these numbers later from current settings is a bug.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeBreakdown {
    pub subtotal: Decimal,
    pub commission_rate: Decimal,
    pub commission_amount: Decimal,
    pub delivery_fee: Decimal,
    pub total: Decimal,
}

impl FeeBreakdown {
    pub fn compute(subtotal: Decimal, commission_rate: Decimal, delivery_fee: Decimal) -> Self {
        let subtotal = round2(subtotal);
        let commission_amount = round2(subtotal * commission_rate);
        let delivery_fee = round2(delivery_fee);
        Self {
            subtotal,
            commission_rate,
            commission_amount,
            delivery_fee,
            total: round2(subtotal + commission_amount + delivery_fee),
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
