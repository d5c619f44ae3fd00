// ============================================================================
// Platter - Ordering Platform Core
// ============================================================================
//
// Business-logic core of the Platter ordering platform: menus and carts with
// the platform fee schedule, the order lifecycle, role-based access, live
// order feeds with a degraded fallback, and the courier hiring workflow.
// Rendering surfaces embed this crate and draw what it resolves.
//
// Layering:
// - store/    - document store abstraction + in-memory implementation
// - domain/   - pure business types and rules (no IO)
// - auth/     - authentication state and the provider seam
// - access/   - route gates and the developer console gate
// - sync/     - live order feeds, realtime with a degraded fallback
// - services/ - stateful workflows (cart, checkout, orders, hiring, settings)
// - metrics/  - Prometheus metrics + exposition server
//
// ============================================================================

pub mod access;
pub mod auth;
pub mod config;
pub mod domain;
pub mod metrics;
pub mod services;
pub mod store;
pub mod sync;
pub mod utils;

// The assembly points most embedders start from.
pub use config::PlatformConfig;
pub use services::{Platform, UserSession};
