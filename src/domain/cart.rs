use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::menu::MenuItem;
use super::order::round2;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("the cart already holds items from another restaurant")]
    DifferentRestaurant,

    #[error("this item is currently unavailable")]
    ItemUnavailable,

    #[error("quantity must be at least 1")]
    InvalidQuantity,

    #[error("no such line in the cart")]
    LineNotFound,
}

// ============================================================================
// Lines
// ============================================================================

/// One cart line: a menu item reference with the price captured at the time
/// it was added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    pub item_id: Uuid,
    pub name: String,
    pub unit_price: Decimal,
    pub qty: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<Uuid>,
}

impl CartLine {
    pub fn from_menu_item(item: &MenuItem, qty: u32) -> Self {
        Self {
            item_id: item.id,
            name: item.name.clone(),
            unit_price: item.price,
            qty: qty.max(1),
            owner_id: item.owner_id,
        }
    }

    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.qty)
    }
}

// ============================================================================
// Cart
// ============================================================================

/// The local cart: lines keyed by item id, all from one restaurant.
///
/// The cart itself only aggregates; availability and same-restaurant checks
/// happen in [`CartService`](crate::services::cart::CartService) before a
/// line ever reaches `add`. Totals are derived on demand and never stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Total unit count across all lines, for the cart badge.
    pub fn total_items(&self) -> u32 {
        self.lines.iter().map(|l| l.qty).sum()
    }

    /// Adds a line, merging into an existing line with the same item id by
    /// summing quantities. A merge keeps the already-recorded owner when the
    /// incoming line omits one, so re-adding an item never erases the
    /// restaurant link.
    pub fn add(&mut self, line: CartLine) {
        let qty = line.qty.max(1);
        match self.lines.iter_mut().find(|l| l.item_id == line.item_id) {
            Some(existing) => {
                existing.qty = existing.qty.saturating_add(qty);
                if existing.owner_id.is_none() {
                    existing.owner_id = line.owner_id;
                }
            }
            None => self.lines.push(CartLine { qty, ..line }),
        }
    }

    /// Removes a line. Returns whether anything was removed.
    pub fn remove(&mut self, item_id: Uuid) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.item_id != item_id);
        self.lines.len() != before
    }

    pub fn change_qty(&mut self, item_id: Uuid, qty: u32) -> Result<(), CartError> {
        if qty == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let line = self
            .lines
            .iter_mut()
            .find(|l| l.item_id == item_id)
            .ok_or(CartError::LineNotFound)?;
        line.qty = qty;
        Ok(())
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// The restaurant this cart belongs to: the first recorded owner link.
    pub fn restaurant_id(&self) -> Option<Uuid> {
        self.lines.iter().find_map(|l| l.owner_id)
    }

    /// The owner link of the first line, including "no link". Used by the
    /// same-restaurant guard, which compares against it strictly.
    pub fn first_owner(&self) -> Option<Option<Uuid>> {
        self.lines.first().map(|l| l.owner_id)
    }

    pub fn subtotal(&self) -> Decimal {
        round2(self.lines.iter().map(CartLine::line_total).sum())
    }

    /// The per-unit platform markup summed over every unit in the cart.
    pub fn markup_total(&self, per_unit_markup: Decimal) -> Decimal {
        round2(per_unit_markup * Decimal::from(self.total_items()))
    }

    pub fn total_with_fees(&self, per_unit_markup: Decimal) -> Decimal {
        self.subtotal() + self.markup_total(per_unit_markup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(id: Uuid, price: Decimal, qty: u32, owner: Option<Uuid>) -> CartLine {
        CartLine {
            item_id: id,
            name: "dish".into(),
            unit_price: price,
            qty,
            owner_id: owner,
        }
    }

    #[test]
    fn adding_the_same_item_twice_merges_quantities() {
        let id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add(line(id, Decimal::new(500, 2), 1, Some(owner)));
        cart.add(line(id, Decimal::new(500, 2), 1, Some(owner)));

        assert_eq!(cart.len(), 1);
        assert_eq!(cart.lines()[0].qty, 2);
        assert_eq!(cart.total_items(), 2);
    }

    #[test]
    fn merge_keeps_recorded_owner_when_new_line_omits_it() {
        let id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add(line(id, Decimal::new(500, 2), 1, Some(owner)));
        cart.add(line(id, Decimal::new(500, 2), 1, None));

        assert_eq!(cart.lines()[0].owner_id, Some(owner));
        assert_eq!(cart.restaurant_id(), Some(owner));
    }

    #[test]
    fn merge_backfills_owner_when_first_add_lacked_one() {
        let id = Uuid::new_v4();
        let owner = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add(line(id, Decimal::new(500, 2), 1, None));
        assert_eq!(cart.restaurant_id(), None);
        cart.add(line(id, Decimal::new(500, 2), 1, Some(owner)));
        assert_eq!(cart.restaurant_id(), Some(owner));
    }

    #[test]
    fn zero_quantity_add_is_bumped_to_one() {
        let mut cart = Cart::new();
        cart.add(line(Uuid::new_v4(), Decimal::new(300, 2), 0, None));
        assert_eq!(cart.lines()[0].qty, 1);
    }

    #[test]
    fn change_qty_validates() {
        let id = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add(line(id, Decimal::new(300, 2), 1, None));

        assert_eq!(cart.change_qty(id, 0), Err(CartError::InvalidQuantity));
        assert_eq!(
            cart.change_qty(Uuid::new_v4(), 2),
            Err(CartError::LineNotFound)
        );
        cart.change_qty(id, 4).unwrap();
        assert_eq!(cart.lines()[0].qty, 4);
    }

    #[test]
    fn remove_reports_whether_anything_changed() {
        let id = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add(line(id, Decimal::new(300, 2), 1, None));
        assert!(cart.remove(id));
        assert!(!cart.remove(id));
        assert!(cart.is_empty());
    }

    #[test]
    fn totals_are_derived_per_unit() {
        let mut cart = Cart::new();
        cart.add(line(Uuid::new_v4(), Decimal::new(1050, 2), 2, None)); // 21.00
        cart.add(line(Uuid::new_v4(), Decimal::new(400, 2), 1, None)); // 4.00

        assert_eq!(cart.subtotal(), Decimal::new(2500, 2));
        // 1.00 markup per unit, 3 units.
        assert_eq!(cart.markup_total(Decimal::ONE), Decimal::from(3));
        assert_eq!(cart.total_with_fees(Decimal::ONE), Decimal::from(28));
    }

    #[test]
    fn totals_change_with_quantity_edits() {
        let id = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add(line(id, Decimal::new(999, 2), 1, None));
        assert_eq!(cart.subtotal(), Decimal::new(999, 2));

        cart.change_qty(id, 3).unwrap();
        assert_eq!(cart.subtotal(), Decimal::new(2997, 2));
        assert_eq!(cart.markup_total(Decimal::ONE), Decimal::from(3));
    }

    #[test]
    fn cart_json_omits_absent_owner_and_roundtrips() {
        let id = Uuid::new_v4();
        let mut cart = Cart::new();
        cart.add(line(id, Decimal::new(750, 2), 2, None));

        let raw = serde_json::to_string(&cart).unwrap();
        assert!(!raw.contains("ownerId"));
        let back: Cart = serde_json::from_str(&raw).unwrap();
        assert_eq!(back, cart);
    }
}
