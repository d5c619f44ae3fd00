// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Pure platform rules: entities, value objects and the validations that make
// the money and lifecycle guarantees hold. Nothing in here performs IO; the
// only store-facing code is the per-entity document converters.
//
// ============================================================================

pub mod cart;
pub mod geo;
pub mod hiring;
pub mod menu;
pub mod order;
pub mod restaurant;
pub mod settings;
pub mod user;

pub use cart::{Cart, CartError, CartLine};
pub use geo::GeoPoint;
pub use hiring::{HiringError, HiringRequest, HiringStatus};
pub use menu::MenuItem;
pub use order::{FeeBreakdown, Order, OrderError, OrderLine, OrderStatus, PaymentMethod};
pub use restaurant::Restaurant;
pub use settings::PlatformSettings;
pub use user::{Role, UserProfile};
