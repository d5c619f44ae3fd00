use super::value_objects::OrderStatus;

// ============================================================================
// Order Lifecycle Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    /// The order reached `delivered` or `cancelled`; nothing moves it again.
    #[error("order is already {current} and cannot change")]
    TerminalState { current: OrderStatus },

    #[error("order is already {status}")]
    AlreadyInStatus { status: OrderStatus },

    /// Statuses only move forward along the fulfilment path (skipping steps
    /// is fine); going back would claim work was undone that nobody undid.
    #[error("cannot move order from {current} back to {requested}")]
    BackwardTransition {
        current: OrderStatus,
        requested: OrderStatus,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_read_like_operator_messages() {
        let err = OrderError::TerminalState {
            current: OrderStatus::Delivered,
        };
        assert_eq!(
            err.to_string(),
            "order is already delivered and cannot change"
        );

        let err = OrderError::BackwardTransition {
            current: OrderStatus::Ready,
            requested: OrderStatus::Pending,
        };
        assert!(err.to_string().contains("ready"));
        assert!(err.to_string().contains("pending"));
    }
}
