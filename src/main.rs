use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use platter::access::gates::{Destination, RouteGate};
use platter::auth::{AuthUser, ScriptedAuth};
use platter::domain::geo::GeoPoint;
use platter::domain::menu::MenuItem;
use platter::domain::order::{Order, OrderStatus};
use platter::domain::restaurant::Restaurant;
use platter::domain::settings::PlatformSettings;
use platter::domain::user::{Role, UserProfile};
use platter::metrics::start_metrics_server;
use platter::services::{MemoryCartStorage, Platform};
use platter::store::collections::{MENU_ITEMS, ORDERS, RESTAURANTS, SETTINGS, SETTINGS_DOC, USERS};
use platter::store::{DocumentStore, MemoryStore, Query};
use platter::sync::{FeedPhase, OrderScope};
use platter::PlatformConfig;

/// Everything the walkthrough seeds into the store up front.
struct Seed {
    customer_id: Uuid,
    owner_id: Uuid,
    courier_id: Uuid,
    developer_id: Uuid,
    restaurant: Restaurant,
    tava: MenuItem,
    fergese: MenuItem,
    pizza: MenuItem,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured logging with environment-based filtering
    // Default to INFO level, can be overridden with RUST_LOG env var
    // Example: RUST_LOG=debug cargo run
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,platter=debug")),
        )
        .init();

    tracing::info!("🚀 Starting Platter core walkthrough");
    tracing::info!("🛒 Cart, checkout and the frozen money snapshot");
    tracing::info!("🔄 Live order feeds with the degraded fallback");
    tracing::info!("📨 Courier hiring and platform settings");

    // === 1. Configuration ===
    let mut config = PlatformConfig::from_env();
    // Give the developer console something to guard in the walkthrough.
    config.developer_secret.get_or_insert_with(|| "platter-dev".to_string());

    // === 2. Store + seed data ===
    // Only the restaurant scope gets its composite index; the customer scope
    // is left unindexed so the walkthrough exercises the degraded fallback.
    let store = MemoryStore::new();
    store.register_index(ORDERS, "restaurantId", "createdAt");
    let seed = seed_store(&store).await?;
    tracing::info!("✅ Store seeded: 4 users, 2 restaurants, 3 menu items");

    // === 3. Platform assembly + metrics ===
    let auth = ScriptedAuth::signed_out();
    let platform = Platform::new(
        Arc::new(store.clone()),
        Arc::new(auth.clone()),
        Arc::new(MemoryCartStorage::new()),
        config.clone(),
    )?;

    let metrics = platform.metrics();
    tracing::info!(
        "📊 Metrics registry created with {} metrics",
        metrics.registry().gather().len()
    );
    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let rt = match tokio::runtime::Runtime::new() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Metrics runtime error: {}", e);
                return;
            }
        };
        rt.block_on(async {
            if let Err(e) = start_metrics_server(metrics_registry, metrics_port).await {
                tracing::error!("Metrics server error: {}", e);
            }
        });
    });

    // === 4. Signed-out browsing ===
    let session = platform.start_session().await?;
    let owner_dashboard = RouteGate::authenticated(Destination::new("/login"))
        .with_roles(&[Role::Owner], Destination::new("/"));
    tracing::info!(
        "🔒 Owner dashboard while signed out: {:?}",
        owner_dashboard.evaluate(session.auth_state(), session.role_state())
    );
    session.sign_out().await;

    // === 5. Customer: browse, cart, checkout ===
    auth.sign_in(AuthUser {
        id: seed.customer_id,
        email: "ana@example.com".into(),
    });
    let session = platform.start_session().await?;
    let customer = session
        .profile()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("seeded customer has no profile"))?;
    tracing::info!("👤 Signed in as {} ({})", customer.display_name(), customer.role);
    tracing::info!(
        "🔒 Owner dashboard as customer: {:?}",
        owner_dashboard.evaluate(session.auth_state(), session.role_state())
    );

    let menu = Query::collection(MENU_ITEMS).filter_eq("ownerId", seed.owner_id.to_string());
    for (id, doc) in store.query(&menu).await? {
        let item = MenuItem::from_document(Uuid::parse_str(&id)?, &doc)?;
        tracing::info!("🍽️  {} - {} lek", item.name, item.price);
    }

    session.cart().add_from_menu(&seed.tava, 2)?;
    session.cart().add_from_menu(&seed.fergese, 1)?;
    if let Err(e) = session.cart().add_from_menu(&seed.pizza, 1) {
        tracing::info!("🛑 Second restaurant in one cart: {}", e);
    }
    tracing::info!(
        "🛒 Cart: {} items, subtotal {}, shown total {}",
        session.cart().total_items(),
        session.cart().subtotal(),
        session.cart().total_with_fees()
    );

    if let Err(e) = session
        .checkout()
        .submit(&customer, session.cart(), "   ", Some(GeoPoint::new(41.32, 19.80)))
        .await
    {
        tracing::info!("🛑 Checkout without an address: {}", e);
    }
    let order = session
        .checkout()
        .submit(
            &customer,
            session.cart(),
            "Rruga e Kavajës 12, Tirana",
            Some(GeoPoint::new(41.3275, 19.8187)),
        )
        .await?;
    tracing::info!(
        "✅ Order placed: {} | subtotal {} + commission {} + delivery {} = {}",
        order.id,
        order.fees.subtotal,
        order.fees.commission_amount,
        order.fees.delivery_fee,
        order.fees.total
    );

    // === 6. Customer feed: no composite index, degraded fallback ===
    let my_orders = session.orders().feed(OrderScope::Customer(seed.customer_id));
    let snapshot = {
        let mut watch = my_orders.watch();
        let snapshot = tokio::time::timeout(
            Duration::from_secs(5),
            watch.wait_for(|s| s.phase != FeedPhase::Subscribing),
        )
        .await??
        .clone();
        snapshot
    };
    tracing::info!(
        "📱 My orders: phase {:?}, {} order(s)",
        snapshot.phase,
        snapshot.orders.len()
    );
    if let Some(warning) = &snapshot.warning {
        tracing::info!("⚠️  Surfaced to the user: {}", warning.message);
    }
    my_orders.refresh();
    tokio::time::sleep(Duration::from_millis(100)).await;
    tracing::info!(
        "🔄 Manual refresh re-fetched {} order(s)",
        my_orders.snapshot().orders.len()
    );
    drop(my_orders);
    session.sign_out().await;

    // === 7. Owner: live feed and fulfilment ===
    auth.sign_in(AuthUser {
        id: seed.owner_id,
        email: "owner@teariu.al".into(),
    });
    let session = platform.start_session().await?;
    let owner = session
        .profile()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("seeded owner has no profile"))?;

    let kitchen = session.orders().feed(OrderScope::Restaurant(seed.owner_id));
    {
        let mut watch = kitchen.watch();
        tokio::time::timeout(
            Duration::from_secs(5),
            watch.wait_for(|s| s.phase == FeedPhase::Live),
        )
        .await??;
    }
    tracing::info!(
        "🔄 Kitchen feed is live with {} order(s)",
        kitchen.snapshot().orders.len()
    );

    for to in [
        OrderStatus::Accepted,
        OrderStatus::Preparing,
        OrderStatus::Ready,
        OrderStatus::OutForDelivery,
        OrderStatus::Delivered,
    ] {
        let updated = session.orders().update_status(&owner, order.id, to).await?;
        tracing::info!("✅ Order {} -> {}", order.id, updated.status);
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    if let Err(e) = session
        .orders()
        .update_status(&owner, order.id, OrderStatus::Cancelled)
        .await
    {
        tracing::info!("🛑 Delivered order cannot move: {}", e);
    }
    drop(kitchen);
    session.sign_out().await;

    // === 8. Courier: hiring request ===
    auth.sign_in(AuthUser {
        id: seed.courier_id,
        email: "blerim@example.com".into(),
    });
    let session = platform.start_session().await?;
    let courier = session
        .profile()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("seeded courier has no profile"))?;

    let request = session
        .hiring()
        .submit_request(&courier, &seed.restaurant)
        .await?;
    tracing::info!("✅ Hiring request filed: {}", request.id);
    if let Err(e) = session
        .hiring()
        .submit_request(&courier, &seed.restaurant)
        .await
    {
        tracing::info!("🛑 Second application while pending: {}", e);
    }
    session.sign_out().await;

    // === 9. Owner decides on the application ===
    auth.sign_in(AuthUser {
        id: seed.owner_id,
        email: "owner@teariu.al".into(),
    });
    let session = platform.start_session().await?;
    let inbox = session.hiring().requests_for_restaurant(&owner).await?;
    tracing::info!("📨 Hiring inbox: {} request(s)", inbox.len());
    let decided = session.hiring().decide(&owner, request.id, true).await?;
    tracing::info!("✅ {} hired by {}", decided.courier_name, decided.restaurant_name);
    session.sign_out().await;

    // === 10. Developer: console gate + commission rate change ===
    auth.sign_in(AuthUser {
        id: seed.developer_id,
        email: "vera@platter.dev".into(),
    });
    let session = platform.start_session().await?;
    let developer = session
        .profile()
        .cloned()
        .ok_or_else(|| anyhow::anyhow!("seeded developer has no profile"))?;

    let gate = session.developer_gate();
    if let Err(e) = gate.check(session.flags()) {
        tracing::info!("🔐 Developer console: {}", e);
    }
    if let Err(e) = gate.unlock(session.flags(), "wrong-secret") {
        tracing::info!("🛑 {}", e);
    }
    gate.unlock(session.flags(), "platter-dev")?;
    tracing::info!("✅ Developer console unlocked for this session");

    session
        .settings_admin()
        .update_commission_rate(&developer, Decimal::new(18, 2))
        .await?;
    tokio::time::sleep(Duration::from_millis(100)).await;
    tracing::info!(
        "📊 Commission rate now {} for new orders",
        session.settings().commission_rate()
    );

    // The delivered order keeps the schedule it was priced under.
    if let Some(doc) = store.get(ORDERS, &order.id.to_string()).await? {
        let frozen = Order::from_document(&doc)?;
        tracing::info!(
            "🧊 Order {} still shows rate {} and total {}",
            frozen.id,
            frozen.fees.commission_rate,
            frozen.fees.total
        );
    }
    session.sign_out().await;

    tracing::info!("🎉 Walkthrough complete!");
    Ok(())
}

async fn seed_store(store: &MemoryStore) -> anyhow::Result<Seed> {
    store
        .put(
            SETTINGS,
            SETTINGS_DOC,
            PlatformSettings {
                commission_rate: Decimal::new(15, 2),
            }
            .to_document(),
        )
        .await?;

    let customer_id = Uuid::new_v4();
    let owner_id = Uuid::new_v4();
    let other_owner_id = Uuid::new_v4();
    let courier_id = Uuid::new_v4();
    let developer_id = Uuid::new_v4();

    let users = [
        (customer_id, "ana@example.com", Some("Ana"), Role::Customer),
        (owner_id, "owner@teariu.al", None, Role::Owner),
        (courier_id, "blerim@example.com", Some("Blerim"), Role::Courier),
        (developer_id, "vera@platter.dev", Some("Vera"), Role::Developer),
    ];
    for (id, email, name, role) in users {
        let profile = UserProfile {
            id,
            email: email.into(),
            name: name.map(str::to_string),
            role,
        };
        store.put(USERS, &id.to_string(), profile.to_document()).await?;
    }

    let restaurant = Restaurant {
        id: owner_id,
        name: "Te Ariu".into(),
        city: Some("Tirana".into()),
        phone: Some("+355 69 000 0000".into()),
        logo_url: None,
        location: Some(GeoPoint::new(41.3275, 19.8187)),
    };
    store
        .put(RESTAURANTS, &owner_id.to_string(), restaurant.to_document())
        .await?;
    let other = Restaurant {
        id: other_owner_id,
        name: "Vila Mediterrane".into(),
        city: Some("Durrës".into()),
        phone: None,
        logo_url: None,
        location: None,
    };
    store
        .put(RESTAURANTS, &other_owner_id.to_string(), other.to_document())
        .await?;

    let tava = MenuItem {
        id: Uuid::new_v4(),
        name: "Tavë kosi".into(),
        price: Decimal::from(8),
        desc: Some("Baked lamb and rice in yogurt".into()),
        image_url: None,
        available: true,
        owner_id: Some(owner_id),
    };
    let fergese = MenuItem {
        id: Uuid::new_v4(),
        name: "Fërgesë".into(),
        price: Decimal::new(650, 2),
        desc: None,
        image_url: None,
        available: true,
        owner_id: Some(owner_id),
    };
    let pizza = MenuItem {
        id: Uuid::new_v4(),
        name: "Pizza Margherita".into(),
        price: Decimal::from(7),
        desc: None,
        image_url: None,
        available: true,
        owner_id: Some(other_owner_id),
    };
    for item in [&tava, &fergese, &pizza] {
        store
            .put(MENU_ITEMS, &item.id.to_string(), item.to_document())
            .await?;
    }

    Ok(Seed {
        customer_id,
        owner_id,
        courier_id,
        developer_id,
        restaurant,
        tava,
        fergese,
        pizza,
    })
}
