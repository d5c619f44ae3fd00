// ============================================================================
// Order Domain - Lifecycle and Money Snapshot
// ============================================================================
//
// Everything order-specific lives here:
// - Value objects (OrderStatus, OrderLine, FeeBreakdown, PaymentMethod)
// - Errors (OrderError enum)
// - The Order entity with its transition rules
//
// The services layer decides WHO may transition an order; this module only
// decides WHICH transitions exist.
//
// ============================================================================

pub mod errors;
pub mod order;
pub mod value_objects;

// Re-export for convenience
pub use errors::*;
pub use order::*;
pub use value_objects::*;
