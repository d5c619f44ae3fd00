// ============================================================================
// Services - Application Layer
// ============================================================================
//
// Stateful workflows composed over the document store and the domain layer:
//
// - cart/       - device-persisted cart with the same-restaurant rule
// - checkout    - order submission with the frozen money snapshot
// - orders      - status transitions and live order feeds
// - hiring      - courier application workflow
// - settings    - live platform settings + admin updates
// - session     - Platform wiring and per-sign-in UserSession assembly
//
// ============================================================================

pub mod cart;
pub mod checkout;
pub mod hiring;
pub mod orders;
pub mod session;
pub mod settings;

pub use cart::{CartService, CartStorage, FileCartStorage, MemoryCartStorage};
pub use checkout::{CheckoutError, CheckoutService};
pub use hiring::{HiringActionError, HiringService};
pub use orders::{OrderActionError, OrderService};
pub use session::{Platform, UserSession};
pub use settings::{SettingsError, SettingsHandle, SettingsService};
