use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::cart::{Cart, CartError, CartLine};
use crate::domain::menu::MenuItem;

// ============================================================================
// Cart Storage
// ============================================================================

/// Where the cart persists between sessions. Device-local and best-effort:
/// implementations log their own failures and never take the cart down with
/// them.
pub trait CartStorage: Send + Sync + 'static {
    /// The raw stored payload, if any readable one exists.
    fn load(&self) -> Option<String>;
    fn save(&self, payload: &str);
    fn clear(&self);
}

/// Test double and demo default: a single in-memory slot.
#[derive(Default)]
pub struct MemoryCartStorage {
    slot: Mutex<Option<String>>,
}

impl MemoryCartStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-loads the slot, for tests that start with persisted state.
    pub fn preloaded(payload: &str) -> Self {
        Self {
            slot: Mutex::new(Some(payload.to_string())),
        }
    }
}

impl CartStorage for MemoryCartStorage {
    fn load(&self) -> Option<String> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, payload: &str) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(payload.to_string());
    }

    fn clear(&self) {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }
}

/// Cart persistence in a JSON file on disk.
pub struct FileCartStorage {
    path: PathBuf,
}

impl FileCartStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CartStorage for FileCartStorage {
    fn load(&self) -> Option<String> {
        match std::fs::read_to_string(&self.path) {
            Ok(payload) => Some(payload),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not read stored cart");
                None
            }
        }
    }

    fn save(&self, payload: &str) {
        if let Err(e) = std::fs::write(&self.path, payload) {
            tracing::warn!(path = %self.path.display(), error = %e, "could not persist cart");
        }
    }

    fn clear(&self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not clear stored cart");
            }
        }
    }
}

// ============================================================================
// Cart Service
// ============================================================================

/// The cart with its guards and persistence wired in.
///
/// Validation order on add: availability, then same-restaurant; a rejected
/// add changes nothing and persists nothing. Every successful mutation is
/// written straight back to storage so a reload finds the cart intact.
pub struct CartService {
    cart: Mutex<Cart>,
    storage: Arc<dyn CartStorage>,
    per_unit_markup: Decimal,
}

impl CartService {
    /// Rehydrates from storage. A corrupt payload is logged and replaced by
    /// an empty cart; carts are not worth failing a session over.
    pub fn new(storage: Arc<dyn CartStorage>, per_unit_markup: Decimal) -> Self {
        let cart = match storage.load() {
            Some(raw) => match serde_json::from_str::<Cart>(&raw) {
                Ok(cart) => {
                    tracing::debug!(lines = cart.len(), "cart rehydrated from storage");
                    cart
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stored cart is unreadable, starting empty");
                    Cart::new()
                }
            },
            None => Cart::new(),
        };
        Self {
            cart: Mutex::new(cart),
            storage,
            per_unit_markup,
        }
    }

    /// Adds a menu item after running the menu-surface guards.
    pub fn add_from_menu(&self, item: &MenuItem, qty: u32) -> Result<(), CartError> {
        if !item.available {
            tracing::warn!(item_id = %item.id, "rejected add: item unavailable");
            return Err(CartError::ItemUnavailable);
        }
        let mut cart = self.lock();
        // One restaurant per cart, judged strictly against the first line:
        // an unlinked item never mixes into a linked cart, or vice versa.
        if let Some(first_owner) = cart.first_owner() {
            if first_owner != item.owner_id {
                tracing::warn!(
                    item_id = %item.id,
                    "rejected add: cart already holds another restaurant's items"
                );
                return Err(CartError::DifferentRestaurant);
            }
        }
        cart.add(CartLine::from_menu_item(item, qty));
        self.persist(&cart);
        tracing::debug!(item_id = %item.id, qty, lines = cart.len(), "item added to cart");
        Ok(())
    }

    pub fn change_qty(&self, item_id: Uuid, qty: u32) -> Result<(), CartError> {
        let mut cart = self.lock();
        cart.change_qty(item_id, qty)?;
        self.persist(&cart);
        Ok(())
    }

    /// Removes a line if present.
    pub fn remove(&self, item_id: Uuid) {
        let mut cart = self.lock();
        if cart.remove(item_id) {
            self.persist(&cart);
        }
    }

    /// Empties the cart and its stored copy.
    pub fn clear(&self) {
        let mut cart = self.lock();
        cart.clear();
        self.storage.clear();
    }

    /// A point-in-time copy, e.g. for checkout to work from.
    pub fn snapshot(&self) -> Cart {
        self.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn total_items(&self) -> u32 {
        self.lock().total_items()
    }

    pub fn subtotal(&self) -> Decimal {
        self.lock().subtotal()
    }

    pub fn markup_total(&self) -> Decimal {
        self.lock().markup_total(self.per_unit_markup)
    }

    pub fn total_with_fees(&self) -> Decimal {
        self.lock().total_with_fees(self.per_unit_markup)
    }

    fn lock(&self) -> MutexGuard<'_, Cart> {
        self.cart.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, cart: &Cart) {
        match serde_json::to_string(cart) {
            Ok(payload) => self.storage.save(&payload),
            Err(e) => tracing::warn!(error = %e, "could not serialize cart for storage"),
        }
    }
}
