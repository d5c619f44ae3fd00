use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use uuid::Uuid;

use crate::access::AccessError;
use crate::domain::order::{Order, OrderError, OrderStatus};
use crate::domain::user::{Role, UserProfile};
use crate::metrics::Metrics;
use crate::store::collections::ORDERS;
use crate::store::{Document, DocumentStore, StoreError};
use crate::sync::{OrderFeed, OrderScope};
use crate::utils::bounded;

// ============================================================================
// Order Action Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderActionError {
    #[error("order {0} not found")]
    NotFound(Uuid),

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Lifecycle(#[from] OrderError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// Order Service
// ============================================================================

/// Reads, watches and transitions placed orders.
pub struct OrderService {
    store: Arc<dyn DocumentStore>,
    op_timeout: Duration,
    metrics: Arc<Metrics>,
}

impl OrderService {
    pub fn new(store: Arc<dyn DocumentStore>, op_timeout: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            store,
            op_timeout,
            metrics,
        }
    }

    pub async fn get(&self, order_id: Uuid) -> Result<Order, OrderActionError> {
        let doc = bounded(
            self.op_timeout,
            self.store.get(ORDERS, &order_id.to_string()),
        )
        .await?
        .ok_or(OrderActionError::NotFound(order_id))?;
        Ok(Order::from_document(&doc)?)
    }

    /// Opens a live feed over this scope's orders. The caller owns the
    /// returned handle; dropping it detaches the listener.
    pub fn feed(&self, scope: OrderScope) -> OrderFeed {
        OrderFeed::open(
            Arc::clone(&self.store),
            scope,
            self.op_timeout,
            Arc::clone(&self.metrics),
        )
    }

    /// Moves an order along its lifecycle on behalf of `actor`.
    ///
    /// Authority first, then lifecycle validation, then a merge-update that
    /// writes only `status` and `updatedAt` - the frozen money fields are
    /// never part of the write set.
    pub async fn update_status(
        &self,
        actor: &UserProfile,
        order_id: Uuid,
        to: OrderStatus,
    ) -> Result<Order, OrderActionError> {
        let mut order = self.get(order_id).await?;

        if let Err(e) = authorize_transition(actor, &order) {
            self.metrics.record_transition_rejected("forbidden");
            tracing::warn!(
                %order_id,
                actor_role = %actor.role,
                requested = %to,
                "🛑 status change refused: not this actor's order"
            );
            return Err(e.into());
        }

        let from = order.status;
        if let Err(e) = order.transition(to, Utc::now()) {
            self.metrics.record_transition_rejected(lifecycle_reason(&e));
            tracing::warn!(%order_id, current = %from, requested = %to, error = %e, "🛑 status change refused");
            return Err(e.into());
        }

        let mut changes = Document::new();
        changes.insert("status".into(), serde_json::Value::String(to.as_str().to_string()));
        changes.insert(
            "updatedAt".into(),
            serde_json::to_value(order.updated_at)
                .map_err(|e| StoreError::decode(ORDERS, e.to_string()))?,
        );
        bounded(
            self.op_timeout,
            self.store.update(ORDERS, &order_id.to_string(), changes),
        )
        .await?;

        self.metrics.record_transition(from, to);
        tracing::info!(%order_id, from = %from, to = %to, actor_role = %actor.role, "order status updated");
        Ok(order)
    }
}

/// Who may transition an order: the restaurant it belongs to, or platform
/// staff. Customers and couriers track orders, they never drive them.
fn authorize_transition(actor: &UserProfile, order: &Order) -> Result<(), AccessError> {
    match actor.role {
        Role::Owner => {
            if order.restaurant_id == actor.id {
                Ok(())
            } else {
                Err(AccessError::Forbidden { role: actor.role })
            }
        }
        Role::Admin | Role::Developer => Ok(()),
        Role::Customer | Role::Courier => Err(AccessError::Forbidden { role: actor.role }),
    }
}

fn lifecycle_reason(e: &OrderError) -> &'static str {
    match e {
        OrderError::TerminalState { .. } => "terminal",
        OrderError::AlreadyInStatus { .. } => "no_change",
        OrderError::BackwardTransition { .. } => "backward",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geo::GeoPoint;
    use crate::domain::order::{FeeBreakdown, OrderLine};
    use rust_decimal::Decimal;
    use crate::store::MemoryStore;

    const TIMEOUT: Duration = Duration::from_secs(1);

    fn profile(id: Uuid, role: Role) -> UserProfile {
        UserProfile {
            id,
            email: "someone@example.com".into(),
            name: None,
            role,
        }
    }

    struct Fixture {
        store: MemoryStore,
        service: OrderService,
        restaurant_id: Uuid,
        order: Order,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = MemoryStore::new();
            let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
            let service = OrderService::new(shared, TIMEOUT, Arc::new(Metrics::new().unwrap()));

            let restaurant_id = Uuid::new_v4();
            let fees =
                FeeBreakdown::compute(Decimal::from(50), Decimal::new(15, 2), Decimal::from(7));
            let order = Order::place(
                Uuid::new_v4(),
                restaurant_id,
                vec![OrderLine {
                    item_id: Uuid::new_v4(),
                    name: "Speca të mbushur".into(),
                    unit_price: Decimal::from(25),
                    qty: 2,
                }],
                fees,
                "Bulevardi Zogu I".into(),
                GeoPoint::new(41.33, 19.82),
                Utc::now(),
            );
            store
                .put(ORDERS, &order.id.to_string(), order.to_document().unwrap())
                .await
                .unwrap();

            Self {
                store,
                service,
                restaurant_id,
                order,
            }
        }

        fn owner(&self) -> UserProfile {
            profile(self.restaurant_id, Role::Owner)
        }
    }

    #[tokio::test]
    async fn owner_walks_the_full_fulfilment_path() {
        let fx = Fixture::new().await;
        let owner = fx.owner();
        for to in [
            OrderStatus::Accepted,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::OutForDelivery,
            OrderStatus::Delivered,
        ] {
            let updated = fx.service.update_status(&owner, fx.order.id, to).await.unwrap();
            assert_eq!(updated.status, to);
        }

        let err = fx
            .service
            .update_status(&owner, fx.order.id, OrderStatus::Cancelled)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderActionError::Lifecycle(OrderError::TerminalState { .. })));
    }

    #[tokio::test]
    async fn pending_orders_can_be_cancelled_once() {
        let fx = Fixture::new().await;
        let owner = fx.owner();
        fx.service
            .update_status(&owner, fx.order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        let err = fx
            .service
            .update_status(&owner, fx.order.id, OrderStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderActionError::Lifecycle(OrderError::TerminalState { .. })));
    }

    #[tokio::test]
    async fn rejected_transitions_change_nothing_in_the_store() {
        let fx = Fixture::new().await;
        let owner = fx.owner();
        fx.service
            .update_status(&owner, fx.order.id, OrderStatus::Ready)
            .await
            .unwrap();

        let err = fx
            .service
            .update_status(&owner, fx.order.id, OrderStatus::Preparing)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderActionError::Lifecycle(OrderError::BackwardTransition { .. })));

        let stored = fx.service.get(fx.order.id).await.unwrap();
        assert_eq!(stored.status, OrderStatus::Ready);
    }

    #[tokio::test]
    async fn only_the_owning_restaurant_or_staff_may_transition() {
        let fx = Fixture::new().await;

        // A different restaurant's owner.
        let err = fx
            .service
            .update_status(&profile(Uuid::new_v4(), Role::Owner), fx.order.id, OrderStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderActionError::Access(AccessError::Forbidden { .. })));

        // The customer who placed it and couriers cannot drive it either.
        for role in [Role::Customer, Role::Courier] {
            let err = fx
                .service
                .update_status(&profile(fx.order.customer_id, role), fx.order.id, OrderStatus::Accepted)
                .await
                .unwrap_err();
            assert!(matches!(err, OrderActionError::Access(AccessError::Forbidden { .. })));
        }

        // Platform staff may.
        for role in [Role::Admin, Role::Developer] {
            let fresh = Fixture::new().await;
            fresh
                .service
                .update_status(&profile(Uuid::new_v4(), role), fresh.order.id, OrderStatus::Accepted)
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn merge_update_leaves_the_money_snapshot_intact() {
        let fx = Fixture::new().await;
        fx.service
            .update_status(&fx.owner(), fx.order.id, OrderStatus::Accepted)
            .await
            .unwrap();

        let doc = fx
            .store
            .get(ORDERS, &fx.order.id.to_string())
            .await
            .unwrap()
            .unwrap();
        let stored = Order::from_document(&doc).unwrap();
        assert_eq!(stored.status, OrderStatus::Accepted);
        assert_eq!(stored.fees, fx.order.fees);
        assert_eq!(stored.items, fx.order.items);
        assert_eq!(stored.created_at, fx.order.created_at);
        assert!(stored.updated_at > fx.order.updated_at);
    }

    #[tokio::test]
    async fn unknown_orders_are_not_found() {
        let fx = Fixture::new().await;
        let err = fx
            .service
            .update_status(&fx.owner(), Uuid::new_v4(), OrderStatus::Accepted)
            .await
            .unwrap_err();
        assert!(matches!(err, OrderActionError::NotFound(_)));
    }
}
