use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::watch;
use uuid::Uuid;

use crate::domain::cart::Cart;
use crate::domain::geo::GeoPoint;
use crate::domain::menu::MenuItem;
use crate::domain::order::{FeeBreakdown, Order, OrderLine};
use crate::domain::settings::PlatformSettings;
use crate::domain::user::UserProfile;
use crate::metrics::Metrics;
use crate::services::cart::CartService;
use crate::store::collections::{MENU_ITEMS, ORDERS};
use crate::store::{DocumentStore, StoreError};
use crate::utils::bounded;

// ============================================================================
// Checkout Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("an order submission is already in progress")]
    SubmissionInProgress,

    #[error("the cart is empty")]
    EmptyCart,

    #[error("a delivery address is required")]
    MissingAddress,

    #[error("a delivery location is required")]
    MissingLocation,

    #[error("could not determine which restaurant this cart belongs to")]
    RestaurantUnresolved,

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl CheckoutError {
    /// Stable label for the rejection counter.
    fn reason(&self) -> &'static str {
        match self {
            Self::SubmissionInProgress => "in_flight",
            Self::EmptyCart => "empty_cart",
            Self::MissingAddress => "missing_address",
            Self::MissingLocation => "missing_location",
            Self::RestaurantUnresolved => "restaurant_unresolved",
            Self::Store(_) => "store",
        }
    }
}

// ============================================================================
// Checkout Service
// ============================================================================

/// Turns a validated cart into a pending order with a frozen fee snapshot.
///
/// The commission rate is read from the live settings watch at the moment of
/// submission and written into the order; the delivery fee comes from
/// configuration. Neither is ever recomputed for an existing order.
pub struct CheckoutService {
    store: Arc<dyn DocumentStore>,
    settings: watch::Receiver<PlatformSettings>,
    delivery_fee: Decimal,
    op_timeout: Duration,
    metrics: Arc<Metrics>,
    in_flight: AtomicBool,
}

impl CheckoutService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        settings: watch::Receiver<PlatformSettings>,
        delivery_fee: Decimal,
        op_timeout: Duration,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            store,
            settings,
            delivery_fee,
            op_timeout,
            metrics,
            in_flight: AtomicBool::new(false),
        }
    }

    /// Submits the cart as an order.
    ///
    /// Guards run in a fixed sequence - in-flight, empty cart, address,
    /// location, restaurant resolution - and any failure leaves both the
    /// store and the cart exactly as they were. Only a successful write
    /// clears the cart.
    pub async fn submit(
        &self,
        customer: &UserProfile,
        cart: &CartService,
        address: &str,
        location: Option<GeoPoint>,
    ) -> Result<Order, CheckoutError> {
        let started = Instant::now();
        let result = self.submit_inner(customer, cart, address, location).await;
        let elapsed = started.elapsed().as_secs_f64();
        match &result {
            Ok(order) => {
                self.metrics.record_checkout(elapsed, None);
                tracing::info!(
                    order_id = %order.id,
                    restaurant_id = %order.restaurant_id,
                    total = %order.fees.total,
                    commission_rate = %order.fees.commission_rate,
                    "✅ order placed"
                );
            }
            Err(e) => {
                self.metrics.record_checkout(elapsed, Some(e.reason()));
                tracing::warn!(error = %e, "checkout rejected");
            }
        }
        result
    }

    async fn submit_inner(
        &self,
        customer: &UserProfile,
        cart: &CartService,
        address: &str,
        location: Option<GeoPoint>,
    ) -> Result<Order, CheckoutError> {
        let _guard = self.begin()?;

        let snapshot = cart.snapshot();
        if snapshot.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        let address = address.trim();
        if address.is_empty() {
            return Err(CheckoutError::MissingAddress);
        }
        let location = location.ok_or(CheckoutError::MissingLocation)?;
        let restaurant_id = self.resolve_restaurant(&snapshot).await?;

        // The moment the money freezes: live rate in, snapshot out.
        let commission_rate = self.settings.borrow().commission_rate;
        let fees = FeeBreakdown::compute(snapshot.subtotal(), commission_rate, self.delivery_fee);
        let items: Vec<OrderLine> = snapshot.lines().iter().map(OrderLine::from_cart_line).collect();
        let order = Order::place(
            customer.id,
            restaurant_id,
            items,
            fees,
            address.to_string(),
            location,
            Utc::now(),
        );

        let doc = order.to_document()?;
        bounded(
            self.op_timeout,
            self.store.put(ORDERS, &order.id.to_string(), doc),
        )
        .await?;

        // Only now is the submission real; a failed write above leaves the
        // cart for another attempt.
        cart.clear();
        Ok(order)
    }

    /// Finds the restaurant the cart belongs to: the first line's owner
    /// link, or failing that the owner recorded on the referenced menu item.
    async fn resolve_restaurant(&self, cart: &Cart) -> Result<Uuid, CheckoutError> {
        let first = match cart.lines().first() {
            Some(line) => line,
            None => return Err(CheckoutError::EmptyCart),
        };
        if let Some(owner) = first.owner_id {
            return Ok(owner);
        }

        tracing::debug!(item_id = %first.item_id, "cart line has no owner link, consulting the menu");
        let doc = bounded(
            self.op_timeout,
            self.store.get(MENU_ITEMS, &first.item_id.to_string()),
        )
        .await?;
        let owner = doc
            .and_then(|doc| match MenuItem::from_document(first.item_id, &doc) {
                Ok(item) => item.owner_id,
                Err(e) => {
                    tracing::warn!(item_id = %first.item_id, error = %e, "menu item unreadable during resolution");
                    None
                }
            });
        owner.ok_or(CheckoutError::RestaurantUnresolved)
    }

    fn begin(&self) -> Result<InFlightGuard<'_>, CheckoutError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(CheckoutError::SubmissionInProgress);
        }
        Ok(InFlightGuard(&self.in_flight))
    }
}

/// Releases the single-submission latch on every exit path.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use crate::services::cart::MemoryCartStorage;
    use crate::services::settings::{SettingsHandle, SettingsService};
    use crate::domain::user::Role;
    use crate::store::MemoryStore;

    const TIMEOUT: Duration = Duration::from_secs(1);

    struct Fixture {
        store: MemoryStore,
        shared: Arc<dyn DocumentStore>,
        settings_service: SettingsService,
        settings: SettingsHandle,
        cart: CartService,
        customer: UserProfile,
        owner_id: Uuid,
        metrics: Arc<Metrics>,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = MemoryStore::new();
            let shared: Arc<dyn DocumentStore> = Arc::new(store.clone());
            let settings_service = SettingsService::new(shared.clone(), TIMEOUT);
            let admin = UserProfile {
                id: Uuid::new_v4(),
                email: "admin@example.com".into(),
                name: None,
                role: Role::Admin,
            };
            settings_service
                .update_commission_rate(&admin, Decimal::new(15, 2))
                .await
                .unwrap();
            let settings = SettingsHandle::open(shared.clone(), TIMEOUT).await.unwrap();
            Self {
                store,
                shared,
                settings_service,
                settings,
                cart: CartService::new(Arc::new(MemoryCartStorage::new()), Decimal::ONE),
                customer: UserProfile {
                    id: Uuid::new_v4(),
                    email: "eda@example.com".into(),
                    name: Some("Eda".into()),
                    role: Role::Customer,
                },
                owner_id: Uuid::new_v4(),
                metrics: Arc::new(Metrics::new().unwrap()),
            }
        }

        fn checkout(&self) -> CheckoutService {
            CheckoutService::new(
                self.shared.clone(),
                self.settings.subscribe(),
                Decimal::from(7),
                TIMEOUT,
                self.metrics.clone(),
            )
        }

        fn menu_item(&self, price: Decimal, owner: Option<Uuid>) -> MenuItem {
            MenuItem {
                id: Uuid::new_v4(),
                name: "Pilaf".into(),
                price,
                desc: None,
                image_url: None,
                available: true,
                owner_id: owner,
            }
        }

        fn fill_cart_to(&self, subtotal: Decimal) {
            let item = self.menu_item(subtotal, Some(self.owner_id));
            self.cart.add_from_menu(&item, 1).unwrap();
        }

        async fn stored_orders(&self) -> Vec<(String, crate::store::Document)> {
            self.store
                .query(&crate::store::Query::collection(ORDERS))
                .await
                .unwrap()
        }
    }

    fn here() -> Option<GeoPoint> {
        Some(GeoPoint::new(41.3275, 19.8187))
    }

    #[tokio::test]
    async fn reference_order_freezes_the_documented_breakdown() {
        let fx = Fixture::new().await;
        fx.fill_cart_to(Decimal::from(100));
        let checkout = fx.checkout();

        let order = checkout
            .submit(&fx.customer, &fx.cart, "Rruga Myslym Shyri 10", here())
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.customer_id, fx.customer.id);
        assert_eq!(order.restaurant_id, fx.owner_id);
        assert_eq!(order.fees.subtotal, Decimal::from(100));
        assert_eq!(order.fees.commission_rate, Decimal::new(15, 2));
        assert_eq!(order.fees.commission_amount, Decimal::from(15));
        assert_eq!(order.fees.delivery_fee, Decimal::from(7));
        assert_eq!(order.fees.total, Decimal::from(122));

        // Success clears the cart and writes exactly one order.
        assert!(fx.cart.is_empty());
        assert_eq!(fx.stored_orders().await.len(), 1);
    }

    #[tokio::test]
    async fn each_guard_fails_distinctly_and_writes_nothing() {
        let fx = Fixture::new().await;
        let checkout = fx.checkout();

        let err = checkout
            .submit(&fx.customer, &fx.cart, "Some street", here())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::EmptyCart));

        fx.fill_cart_to(Decimal::from(30));
        let err = checkout
            .submit(&fx.customer, &fx.cart, "   ", here())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::MissingAddress));

        let err = checkout
            .submit(&fx.customer, &fx.cart, "Some street", None)
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::MissingLocation));

        // Nothing was written and the cart survived every rejection.
        assert_eq!(fx.stored_orders().await.len(), 0);
        assert_eq!(fx.cart.total_items(), 1);
        assert_eq!(
            fx.metrics
                .checkout_rejected
                .with_label_values(&["missing_address"])
                .get(),
            1
        );
    }

    #[tokio::test]
    async fn unresolvable_restaurant_rejects_the_submission() {
        let fx = Fixture::new().await;
        // An item with no owner link that the menu cannot resolve either.
        let item = fx.menu_item(Decimal::from(12), None);
        fx.cart.add_from_menu(&item, 1).unwrap();
        let checkout = fx.checkout();

        let err = checkout
            .submit(&fx.customer, &fx.cart, "Some street", here())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::RestaurantUnresolved));
        assert_eq!(fx.stored_orders().await.len(), 0);
        assert_eq!(fx.cart.total_items(), 1);
    }

    #[tokio::test]
    async fn owner_recovered_from_menu_when_cart_line_lacks_it() {
        let fx = Fixture::new().await;
        let mut item = fx.menu_item(Decimal::from(12), None);
        fx.cart.add_from_menu(&item, 1).unwrap();

        // The menu document does carry the link.
        item.owner_id = Some(fx.owner_id);
        fx.store
            .put(MENU_ITEMS, &item.id.to_string(), item.to_document())
            .await
            .unwrap();

        let order = fx
            .checkout()
            .submit(&fx.customer, &fx.cart, "Some street", here())
            .await
            .unwrap();
        assert_eq!(order.restaurant_id, fx.owner_id);
    }

    #[tokio::test]
    async fn store_outage_keeps_the_cart_for_retry() {
        let fx = Fixture::new().await;
        fx.fill_cart_to(Decimal::from(40));
        let checkout = fx.checkout();

        fx.store.set_offline(true);
        let err = checkout
            .submit(&fx.customer, &fx.cart, "Some street", here())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Store(_)));
        assert_eq!(fx.cart.total_items(), 1);

        fx.store.set_offline(false);
        checkout
            .submit(&fx.customer, &fx.cart, "Some street", here())
            .await
            .unwrap();
        assert!(fx.cart.is_empty());
        assert_eq!(fx.stored_orders().await.len(), 1);
    }

    #[tokio::test]
    async fn rate_changes_apply_to_new_orders_and_never_to_old_ones() {
        let fx = Fixture::new().await;
        fx.fill_cart_to(Decimal::from(100));
        let checkout = fx.checkout();

        let first = checkout
            .submit(&fx.customer, &fx.cart, "Some street", here())
            .await
            .unwrap();
        assert_eq!(first.fees.commission_amount, Decimal::from(15));

        // Admin moves the rate; the watch propagates it.
        let admin = UserProfile {
            id: Uuid::new_v4(),
            email: "admin@example.com".into(),
            name: None,
            role: Role::Admin,
        };
        fx.settings_service
            .update_commission_rate(&admin, Decimal::new(20, 2))
            .await
            .unwrap();
        let mut rx = fx.settings.subscribe();
        tokio::time::timeout(
            TIMEOUT,
            rx.wait_for(|s| s.commission_rate == Decimal::new(20, 2)),
        )
        .await
        .unwrap()
        .unwrap();

        fx.fill_cart_to(Decimal::from(100));
        let second = checkout
            .submit(&fx.customer, &fx.cart, "Some street", here())
            .await
            .unwrap();
        assert_eq!(second.fees.commission_rate, Decimal::new(20, 2));
        assert_eq!(second.fees.commission_amount, Decimal::from(20));
        assert_eq!(second.fees.total, Decimal::from(127));

        // The first order's stored document still carries the old snapshot.
        let stored = fx
            .store
            .get(ORDERS, &first.id.to_string())
            .await
            .unwrap()
            .unwrap();
        let stored = Order::from_document(&stored).unwrap();
        assert_eq!(stored.fees.commission_rate, Decimal::new(15, 2));
        assert_eq!(stored.fees.total, Decimal::from(122));
    }

    #[tokio::test]
    async fn concurrent_submission_is_latched_out() {
        let fx = Fixture::new().await;
        fx.fill_cart_to(Decimal::from(10));
        let checkout = fx.checkout();

        // Hold the latch the way a stuck first submission would.
        let guard = checkout.begin().unwrap();
        let err = checkout
            .submit(&fx.customer, &fx.cart, "Some street", here())
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::SubmissionInProgress));
        drop(guard);

        checkout
            .submit(&fx.customer, &fx.cart, "Some street", here())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn totals_round_half_away_from_zero() {
        let fx = Fixture::new().await;
        // 33.33 * 0.15 = 4.9995 -> 5.00
        fx.fill_cart_to(Decimal::new(3333, 2));
        let order = fx
            .checkout()
            .submit(&fx.customer, &fx.cart, "Some street", here())
            .await
            .unwrap();
        assert_eq!(order.fees.commission_amount, Decimal::new(500, 2));
        assert_eq!(order.fees.total, Decimal::new(4533, 2));
    }
}
