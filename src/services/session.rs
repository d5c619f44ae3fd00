use std::sync::Arc;

use crate::access::developer::{DeveloperGate, SessionFlags};
use crate::access::gates::RoleState;
use crate::auth::{AuthProvider, AuthState, AuthUser};
use crate::config::PlatformConfig;
use crate::domain::user::UserProfile;
use crate::metrics::Metrics;
use crate::services::cart::{CartService, CartStorage};
use crate::services::checkout::CheckoutService;
use crate::services::hiring::HiringService;
use crate::services::orders::OrderService;
use crate::services::settings::{SettingsHandle, SettingsService};
use crate::store::collections::USERS;
use crate::store::{DocumentStore, StoreError};
use crate::utils::bounded;

// ============================================================================
// Platform - long-lived wiring
// ============================================================================

/// The process-wide half of the system: store, auth provider, device cart
/// storage, configuration and metrics. One `Platform` outlives any number of
/// sign-in / sign-out cycles.
pub struct Platform {
    store: Arc<dyn DocumentStore>,
    auth: Arc<dyn AuthProvider>,
    cart_storage: Arc<dyn CartStorage>,
    config: PlatformConfig,
    metrics: Arc<Metrics>,
}

impl Platform {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        auth: Arc<dyn AuthProvider>,
        cart_storage: Arc<dyn CartStorage>,
        config: PlatformConfig,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            store,
            auth,
            cart_storage,
            config,
            metrics: Arc::new(Metrics::new()?),
        })
    }

    pub fn store(&self) -> Arc<dyn DocumentStore> {
        Arc::clone(&self.store)
    }

    pub fn config(&self) -> &PlatformConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    /// Resolves the current auth state and assembles a working session
    /// around it.
    ///
    /// Profile problems are deliberately non-fatal: a signed-in user whose
    /// profile document is missing or unreadable still gets a session, with
    /// [`RoleState::Missing`] steering the route gates to the safe fallback.
    pub async fn start_session(&self) -> Result<UserSession, StoreError> {
        let auth_state = self.auth.resolve().await;

        let profile = match auth_state.user() {
            Some(user) => self.load_profile(user).await,
            None => None,
        };

        let settings = SettingsHandle::open(self.store(), self.config.op_timeout).await?;

        let cart = CartService::new(Arc::clone(&self.cart_storage), self.config.item_markup);
        let checkout = CheckoutService::new(
            self.store(),
            settings.subscribe(),
            self.config.delivery_fee,
            self.config.op_timeout,
            self.metrics(),
        );
        let orders = OrderService::new(self.store(), self.config.op_timeout, self.metrics());
        let hiring = HiringService::new(self.store(), self.config.op_timeout, self.metrics());
        let settings_admin = SettingsService::new(self.store(), self.config.op_timeout);
        let dev_gate = DeveloperGate::new(self.config.developer_secret.clone());

        tracing::info!(
            signed_in = auth_state.user().is_some(),
            role = profile.as_ref().map(|p| p.role.as_str()).unwrap_or("none"),
            "session started"
        );

        Ok(UserSession {
            auth: Arc::clone(&self.auth),
            auth_state,
            profile,
            flags: SessionFlags::new(),
            settings,
            cart,
            checkout,
            orders,
            hiring,
            settings_admin,
            dev_gate,
        })
    }

    async fn load_profile(&self, user: &AuthUser) -> Option<UserProfile> {
        let doc = match bounded(
            self.config.op_timeout,
            self.store.get(USERS, &user.id.to_string()),
        )
        .await
        {
            Ok(Some(doc)) => doc,
            Ok(None) => {
                tracing::warn!(user_id = %user.id, "signed-in user has no profile document");
                return None;
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "profile load failed");
                return None;
            }
        };

        match UserProfile::from_document(user, &doc) {
            Ok(profile) => Some(profile),
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "profile document unreadable");
                None
            }
        }
    }
}

// ============================================================================
// User Session
// ============================================================================

/// Everything a signed-in (or browsing) user works through: their cart, the
/// checkout engine, order feeds, hiring workflow and the live settings
/// handle. Dropping the session tears down its background listeners.
pub struct UserSession {
    auth: Arc<dyn AuthProvider>,
    auth_state: AuthState,
    profile: Option<UserProfile>,
    flags: SessionFlags,
    settings: SettingsHandle,
    cart: CartService,
    checkout: CheckoutService,
    orders: OrderService,
    hiring: HiringService,
    settings_admin: SettingsService,
    dev_gate: DeveloperGate,
}

impl UserSession {
    pub fn auth_state(&self) -> &AuthState {
        &self.auth_state
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    /// Role as the route gates see it.
    pub fn role_state(&self) -> RoleState {
        match &self.auth_state {
            AuthState::Loading => RoleState::Loading,
            AuthState::SignedOut => RoleState::Missing,
            AuthState::SignedIn(_) => match &self.profile {
                Some(profile) => RoleState::Known(profile.role),
                None => RoleState::Missing,
            },
        }
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    pub fn cart(&self) -> &CartService {
        &self.cart
    }

    pub fn checkout(&self) -> &CheckoutService {
        &self.checkout
    }

    pub fn orders(&self) -> &OrderService {
        &self.orders
    }

    pub fn hiring(&self) -> &HiringService {
        &self.hiring
    }

    pub fn settings_admin(&self) -> &SettingsService {
        &self.settings_admin
    }

    pub fn developer_gate(&self) -> &DeveloperGate {
        &self.dev_gate
    }

    pub fn flags(&self) -> &SessionFlags {
        &self.flags
    }

    /// Signs out and consumes the session. Session flags are wiped first, so
    /// a relocked developer console cannot leak into the next sign-in, and
    /// dropping `self` detaches every live listener.
    pub async fn sign_out(self) {
        self.flags.clear_all();
        self.auth.sign_out().await;
        tracing::info!("session signed out");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::gates::{Destination, GateDecision, RouteGate};
    use crate::domain::geo::GeoPoint;
    use crate::domain::menu::MenuItem;
    use crate::domain::restaurant::Restaurant;
    use crate::domain::settings::PlatformSettings;
    use crate::domain::user::Role;
    use crate::auth::ScriptedAuth;
    use crate::services::cart::MemoryCartStorage;
    use crate::store::collections::{MENU_ITEMS, ORDERS, RESTAURANTS, SETTINGS, SETTINGS_DOC};
    use crate::store::MemoryStore;
    use crate::sync::{FeedPhase, OrderScope};
    use rust_decimal::Decimal;
    use std::time::Duration;
    use uuid::Uuid;

    async fn wait_for_phase(feed: &crate::sync::OrderFeed, phase: FeedPhase) {
        let mut watch = feed.watch();
        tokio::time::timeout(Duration::from_secs(2), watch.wait_for(|s| s.phase == phase))
            .await
            .expect("feed phase not reached in time")
            .expect("feed state channel closed");
    }

    struct World {
        store: MemoryStore,
        auth: ScriptedAuth,
        platform: Platform,
        customer_id: Uuid,
        owner_id: Uuid,
        item: MenuItem,
    }

    async fn seed_world() -> World {
        let store = MemoryStore::new();
        store.register_index(ORDERS, "restaurantId", "createdAt");
        store.register_index(ORDERS, "customerId", "createdAt");

        let settings = PlatformSettings {
            commission_rate: Decimal::new(15, 2),
        };
        store
            .put(SETTINGS, SETTINGS_DOC, settings.to_document())
            .await
            .unwrap();

        let customer_id = Uuid::new_v4();
        let customer = UserProfile {
            id: customer_id,
            email: "ana@example.com".into(),
            name: Some("Ana".into()),
            role: Role::Customer,
        };
        store
            .put(USERS, &customer_id.to_string(), customer.to_document())
            .await
            .unwrap();

        let owner_id = Uuid::new_v4();
        let owner = UserProfile {
            id: owner_id,
            email: "owner@example.com".into(),
            name: None,
            role: Role::Owner,
        };
        store
            .put(USERS, &owner_id.to_string(), owner.to_document())
            .await
            .unwrap();
        let restaurant = Restaurant {
            id: owner_id,
            name: "Te Ariu".into(),
            city: Some("Tirana".into()),
            phone: None,
            logo_url: None,
            location: None,
        };
        store
            .put(RESTAURANTS, &owner_id.to_string(), restaurant.to_document())
            .await
            .unwrap();

        let item = MenuItem {
            id: Uuid::new_v4(),
            name: "Tavë kosi".into(),
            price: Decimal::from(8),
            desc: None,
            image_url: None,
            available: true,
            owner_id: Some(owner_id),
        };
        store
            .put(MENU_ITEMS, &item.id.to_string(), item.to_document())
            .await
            .unwrap();

        let auth = ScriptedAuth::signed_in(customer_id, "ana@example.com");
        let platform = Platform::new(
            Arc::new(store.clone()),
            Arc::new(auth.clone()),
            Arc::new(MemoryCartStorage::new()),
            PlatformConfig::default(),
        )
        .unwrap();

        World {
            store,
            auth,
            platform,
            customer_id,
            owner_id,
            item,
        }
    }

    #[tokio::test]
    async fn checkout_flows_through_to_the_owners_live_feed() {
        let world = seed_world().await;
        let session = world.platform.start_session().await.unwrap();
        assert_eq!(session.role_state(), RoleState::Known(Role::Customer));

        let customer = session.profile().unwrap().clone();
        session.cart().add_from_menu(&world.item, 2).unwrap();
        let order = session
            .checkout()
            .submit(
                &customer,
                session.cart(),
                "Rruga e Kavajës 12",
                Some(GeoPoint::new(41.32, 19.80)),
            )
            .await
            .unwrap();
        assert!(session.cart().is_empty());
        assert_eq!(order.customer_id, world.customer_id);
        assert!(world
            .store
            .get(ORDERS, &order.id.to_string())
            .await
            .unwrap()
            .is_some());

        // The owner's feed is indexed, so it streams the new order live.
        let feed = session.orders().feed(OrderScope::Restaurant(world.owner_id));
        wait_for_phase(&feed, FeedPhase::Live).await;
        let snapshot = feed.snapshot();
        assert_eq!(snapshot.orders.len(), 1);
        assert_eq!(snapshot.orders[0].id, order.id);
    }

    #[tokio::test]
    async fn signed_out_sessions_browse_but_gates_redirect() {
        let world = seed_world().await;
        world.auth.sign_out().await;

        let session = world.platform.start_session().await.unwrap();
        assert!(session.profile().is_none());
        assert_eq!(session.role_state(), RoleState::Missing);

        // Browsing the cart still works without an account.
        session.cart().add_from_menu(&world.item, 1).unwrap();
        assert_eq!(session.cart().total_items(), 1);

        let gate = RouteGate::authenticated(Destination::new("/login"));
        assert_eq!(
            gate.evaluate(session.auth_state(), session.role_state()),
            GateDecision::Redirect(Destination::new("/login"))
        );
    }

    #[tokio::test]
    async fn missing_profile_documents_do_not_break_session_start() {
        let world = seed_world().await;
        let ghost = Uuid::new_v4();
        world.auth.sign_in(AuthUser {
            id: ghost,
            email: "ghost@example.com".into(),
        });

        let session = world.platform.start_session().await.unwrap();
        assert!(matches!(session.auth_state(), AuthState::SignedIn(_)));
        assert!(session.profile().is_none());
        assert_eq!(session.role_state(), RoleState::Missing);
    }

    #[tokio::test]
    async fn sign_out_wipes_session_flags_and_auth() {
        let world = seed_world().await;
        let session = world.platform.start_session().await.unwrap();
        session.flags().set("dev_console_unlocked");

        session.sign_out().await;
        assert!(matches!(world.auth.resolve().await, AuthState::SignedOut));

        // The next session starts with a clean slate.
        let next = world.platform.start_session().await.unwrap();
        assert!(!next.flags().is_set("dev_console_unlocked"));
        assert!(next.profile().is_none());
    }

    #[tokio::test]
    async fn cart_persists_across_sessions_on_the_same_device() {
        let world = seed_world().await;
        {
            let session = world.platform.start_session().await.unwrap();
            session.cart().add_from_menu(&world.item, 3).unwrap();
        }

        let next = world.platform.start_session().await.unwrap();
        assert_eq!(next.cart().total_items(), 3);
    }
}
