//! The session cart model and its mutation rules.
//!
//! A [`Cart`] is an ordered list of [`CartItem`]s keyed by
//! [`ProductClassId`]. Two invariants hold for every value of this type,
//! including ones read back from storage:
//!
//! - no line has a quantity of zero (a zero quantity means the line is gone)
//! - no two lines share a product class id

use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::id::ProductClassId;
use super::message::RecalculationResult;
use super::price::{CurrencyCode, Price};

/// Unknown cart operation name.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown cart operation: {0:?} (expected up, down or remove)")]
pub struct CartOperationError(pub String);

/// A single quantity-changing operation on one cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartOperation {
    /// Add one unit, inserting the line if needed.
    Increment,
    /// Remove one unit, dropping the line when it reaches zero.
    Decrement,
    /// Drop the line entirely.
    Remove,
}

impl CartOperation {
    /// The path segment naming this operation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Increment => "up",
            Self::Decrement => "down",
            Self::Remove => "remove",
        }
    }
}

impl fmt::Display for CartOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CartOperation {
    type Err = CartOperationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Increment),
            "down" => Ok(Self::Decrement),
            "remove" => Ok(Self::Remove),
            other => Err(CartOperationError(other.to_string())),
        }
    }
}

/// One product variant and its requested quantity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    product_class_id: ProductClassId,
    quantity: u32,
    /// Unit price seen at the last recalculation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit_price: Option<Decimal>,
}

impl CartItem {
    const fn new(product_class_id: ProductClassId, quantity: u32) -> Self {
        Self {
            product_class_id,
            quantity,
            unit_price: None,
        }
    }

    #[must_use]
    pub const fn product_class_id(&self) -> ProductClassId {
        self.product_class_id
    }

    #[must_use]
    pub const fn quantity(&self) -> u32 {
        self.quantity
    }

    #[must_use]
    pub const fn unit_price(&self) -> Option<Decimal> {
        self.unit_price
    }

    /// Record the current unit price, returning the previous snapshot.
    pub fn record_price(&mut self, price: Decimal) -> Option<Decimal> {
        self.unit_price.replace(price)
    }

    /// Line total from the price snapshot, if the line has been priced.
    #[must_use]
    pub fn line_total(&self) -> Option<Decimal> {
        self.unit_price
            .map(|price| price * Decimal::from(self.quantity))
    }
}

/// Session-scoped collection of line items.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CartRecord")]
pub struct Cart {
    items: Vec<CartItem>,
    locked: bool,
}

/// Unchecked wire shape; converted through [`Cart::normalized`].
#[derive(Deserialize)]
struct CartRecord {
    #[serde(default)]
    items: Vec<CartItem>,
    #[serde(default)]
    locked: bool,
}

impl From<CartRecord> for Cart {
    fn from(record: CartRecord) -> Self {
        Self::normalized(record.items, record.locked)
    }
}

impl Cart {
    /// An empty, unlocked cart.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            locked: false,
        }
    }

    /// Build a cart from `(id, quantity)` pairs.
    ///
    /// Zero quantities are dropped and repeated ids are merged into the
    /// first occurrence.
    pub fn from_items(items: impl IntoIterator<Item = (ProductClassId, u32)>) -> Self {
        let items = items
            .into_iter()
            .map(|(id, quantity)| CartItem::new(id, quantity))
            .collect();
        Self::normalized(items, false)
    }

    fn normalized(raw: Vec<CartItem>, locked: bool) -> Self {
        let mut items: Vec<CartItem> = Vec::with_capacity(raw.len());
        for item in raw {
            if item.quantity == 0 {
                continue;
            }
            match items
                .iter_mut()
                .find(|existing| existing.product_class_id == item.product_class_id)
            {
                Some(existing) => {
                    existing.quantity = existing.quantity.saturating_add(item.quantity);
                }
                None => items.push(item),
            }
        }
        Self { items, locked }
    }

    /// Lines in insertion order.
    #[must_use]
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Mutable access for recalculation; quantities stay read-only.
    pub fn items_mut(&mut self) -> impl Iterator<Item = &mut CartItem> {
        self.items.iter_mut()
    }

    #[must_use]
    pub fn get(&self, id: ProductClassId) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_class_id == id)
    }

    /// Quantity of `id`, zero when absent.
    #[must_use]
    pub fn quantity_of(&self, id: ProductClassId) -> u32 {
        self.get(id).map_or(0, CartItem::quantity)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub const fn is_locked(&self) -> bool {
        self.locked
    }

    /// Total units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, item| acc.saturating_add(item.quantity))
    }

    /// Apply one operation to the line for `id`.
    ///
    /// Lock status is not checked here; callers refuse locked carts before
    /// resolving the product.
    pub fn apply(&mut self, id: ProductClassId, operation: CartOperation) {
        let position = self
            .items
            .iter()
            .position(|item| item.product_class_id == id);

        match (operation, position) {
            (CartOperation::Increment, Some(index)) => {
                if let Some(item) = self.items.get_mut(index) {
                    item.quantity = item.quantity.saturating_add(1);
                }
            }
            (CartOperation::Increment, None) => self.items.push(CartItem::new(id, 1)),
            (CartOperation::Decrement, Some(index)) => {
                let emptied = self.items.get_mut(index).is_some_and(|item| {
                    item.quantity = item.quantity.saturating_sub(1);
                    item.quantity == 0
                });
                if emptied {
                    self.items.remove(index);
                }
            }
            (CartOperation::Remove, Some(index)) => {
                self.items.remove(index);
            }
            (CartOperation::Decrement | CartOperation::Remove, None) => {}
        }
    }

    /// Mark the cart read-only for checkout. Idempotent.
    pub const fn lock(&mut self) {
        self.locked = true;
    }

    /// Drop every line and release the lock.
    pub fn clear(&mut self) {
        self.items.clear();
        self.locked = false;
    }

    /// Totals for display.
    ///
    /// Unpriced lines count towards `quantity` but not `subtotal`. With no
    /// threshold configured, delivery is never free.
    #[must_use]
    pub fn totals(
        &self,
        currency_code: CurrencyCode,
        free_delivery_threshold: Option<Decimal>,
    ) -> CartTotals {
        let subtotal: Decimal = self.items.iter().filter_map(CartItem::line_total).sum();
        let (free_delivery_remaining, is_delivery_free) = match free_delivery_threshold {
            Some(threshold) if subtotal >= threshold => (Decimal::ZERO, true),
            Some(threshold) => (threshold - subtotal, false),
            None => (Decimal::ZERO, false),
        };

        CartTotals {
            subtotal: Price::new(subtotal, currency_code),
            quantity: self.total_quantity(),
            free_delivery_remaining: Price::new(free_delivery_remaining, currency_code),
            is_delivery_free,
        }
    }
}

/// Computed figures shown alongside the cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartTotals {
    pub subtotal: Price,
    pub quantity: u32,
    /// Amount still needed to reach free delivery.
    pub free_delivery_remaining: Price,
    pub is_delivery_free: bool,
}

/// Where a cart stands after recalculation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CartState {
    Empty,
    Valid,
    /// Has fatal errors; about to be reset.
    Invalid,
    /// Checkout has begun; no further edits.
    Locked,
}

impl CartState {
    #[must_use]
    pub fn evaluate(cart: &Cart, result: &RecalculationResult) -> Self {
        if result.has_error() {
            Self::Invalid
        } else if cart.is_locked() {
            Self::Locked
        } else if cart.is_empty() {
            Self::Empty
        } else {
            Self::Valid
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PC10: ProductClassId = ProductClassId::new(10);
    const PC20: ProductClassId = ProductClassId::new(20);

    fn pairs(cart: &Cart) -> Vec<(i32, u32)> {
        cart.items()
            .iter()
            .map(|item| (item.product_class_id().as_i32(), item.quantity()))
            .collect()
    }

    #[test]
    fn test_operation_from_str() {
        assert_eq!("up".parse::<CartOperation>(), Ok(CartOperation::Increment));
        assert_eq!("down".parse::<CartOperation>(), Ok(CartOperation::Decrement));
        assert_eq!("remove".parse::<CartOperation>(), Ok(CartOperation::Remove));
        assert!("UP".parse::<CartOperation>().is_err());
        assert!("delete".parse::<CartOperation>().is_err());
    }

    #[test]
    fn test_increment_inserts_then_counts() {
        let mut cart = Cart::new();
        cart.apply(PC10, CartOperation::Increment);
        assert_eq!(pairs(&cart), vec![(10, 1)]);

        cart.apply(PC10, CartOperation::Increment);
        assert_eq!(pairs(&cart), vec![(10, 2)]);
    }

    #[test]
    fn test_increment_keeps_insertion_order() {
        let mut cart = Cart::new();
        cart.apply(PC20, CartOperation::Increment);
        cart.apply(PC10, CartOperation::Increment);
        cart.apply(PC20, CartOperation::Increment);
        assert_eq!(pairs(&cart), vec![(20, 2), (10, 1)]);
    }

    #[test]
    fn test_decrement_to_zero_removes_line() {
        let mut cart = Cart::from_items([(PC10, 2)]);
        cart.apply(PC10, CartOperation::Decrement);
        assert_eq!(pairs(&cart), vec![(10, 1)]);

        cart.apply(PC10, CartOperation::Decrement);
        assert!(cart.is_empty());
        assert_eq!(cart.quantity_of(PC10), 0);
    }

    #[test]
    fn test_decrement_absent_is_noop() {
        let mut cart = Cart::from_items([(PC20, 1)]);
        cart.apply(PC10, CartOperation::Decrement);
        assert_eq!(pairs(&cart), vec![(20, 1)]);
    }

    #[test]
    fn test_remove_is_idempotent() {
        let mut once = Cart::from_items([(PC10, 3), (PC20, 1)]);
        once.apply(PC10, CartOperation::Remove);

        let mut twice = once.clone();
        twice.apply(PC10, CartOperation::Remove);

        assert_eq!(once, twice);
        assert_eq!(pairs(&twice), vec![(20, 1)]);
    }

    #[test]
    fn test_increment_then_decrement_restores_absent_item() {
        let before = Cart::from_items([(PC20, 4)]);
        let mut cart = before.clone();
        cart.apply(PC10, CartOperation::Increment);
        cart.apply(PC10, CartOperation::Decrement);
        assert_eq!(cart, before);
    }

    #[test]
    fn test_from_items_normalizes() {
        let cart = Cart::from_items([(PC10, 0), (PC20, 1), (PC10, 2), (PC20, 3)]);
        assert_eq!(pairs(&cart), vec![(20, 4), (10, 2)]);
    }

    #[test]
    fn test_deserialize_normalizes_stored_rows() {
        let json = r#"{
            "items": [
                {"product_class_id": 10, "quantity": 0},
                {"product_class_id": 20, "quantity": 1},
                {"product_class_id": 20, "quantity": 1, "unit_price": "5.00"}
            ],
            "locked": true
        }"#;
        let cart: Cart = serde_json::from_str(json).unwrap();
        assert_eq!(pairs(&cart), vec![(20, 2)]);
        assert!(cart.is_locked());
    }

    #[test]
    fn test_serialize_round_trips_price_snapshot() {
        let mut cart = Cart::from_items([(PC10, 2)]);
        for item in cart.items_mut() {
            item.record_price(Decimal::new(1250, 2));
        }
        let json = serde_json::to_string(&cart).unwrap();
        let back: Cart = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cart);
    }

    #[test]
    fn test_lock_and_clear() {
        let mut cart = Cart::from_items([(PC10, 1)]);
        cart.lock();
        cart.lock();
        assert!(cart.is_locked());

        cart.clear();
        assert!(cart.is_empty());
        assert!(!cart.is_locked());
    }

    #[test]
    fn test_totals_with_threshold() {
        let mut cart = Cart::from_items([(PC10, 2), (PC20, 1)]);
        for item in cart.items_mut() {
            if item.product_class_id() == PC10 {
                item.record_price(Decimal::new(1000, 2));
            }
        }

        let totals = cart.totals(CurrencyCode::USD, Some(Decimal::from(50)));
        assert_eq!(totals.subtotal.amount, Decimal::from(20));
        assert_eq!(totals.quantity, 3);
        assert_eq!(totals.free_delivery_remaining.amount, Decimal::from(30));
        assert!(!totals.is_delivery_free);

        let totals = cart.totals(CurrencyCode::USD, Some(Decimal::from(20)));
        assert!(totals.is_delivery_free);
        assert_eq!(totals.free_delivery_remaining.amount, Decimal::ZERO);
    }

    #[test]
    fn test_totals_without_threshold() {
        let totals = Cart::new().totals(CurrencyCode::EUR, None);
        assert_eq!(totals.subtotal.amount, Decimal::ZERO);
        assert!(!totals.is_delivery_free);
    }

    #[test]
    fn test_state_evaluate() {
        let mut result = RecalculationResult::default();
        assert_eq!(CartState::evaluate(&Cart::new(), &result), CartState::Empty);

        let mut cart = Cart::from_items([(PC10, 1)]);
        assert_eq!(CartState::evaluate(&cart, &result), CartState::Valid);

        cart.lock();
        assert_eq!(CartState::evaluate(&cart, &result), CartState::Locked);

        result.add_error(crate::Message::new("gone"));
        assert_eq!(CartState::evaluate(&cart, &result), CartState::Invalid);
    }
}
