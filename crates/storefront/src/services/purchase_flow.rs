//! Cart recalculation against the live catalog.
//!
//! Each line is resolved in cart order and classified:
//!
//! | condition | outcome |
//! |---|---|
//! | product class missing | error |
//! | discontinued | error |
//! | price differs from the line's snapshot | warning, snapshot refreshed |
//! | stock below requested quantity | warning |
//! | sale limit below requested quantity | warning |
//!
//! Quantities are never adjusted here.

use std::sync::Arc;

use tracing::{debug, instrument};

use cartflow_core::{Cart, CartItem, Message, Price, RecalculationResult};

use crate::catalog::{CatalogEntry, CatalogLookup, LookupError};

/// The cart purchase flow: validates and prices every line.
#[derive(Clone)]
pub struct PurchaseFlow {
    catalog: Arc<dyn CatalogLookup>,
}

impl PurchaseFlow {
    #[must_use]
    pub fn new(catalog: Arc<dyn CatalogLookup>) -> Self {
        Self { catalog }
    }

    /// Recalculate `cart` in place, refreshing price snapshots.
    ///
    /// # Errors
    ///
    /// Returns `LookupError` as soon as one lookup fails; the remaining
    /// lines are not examined.
    #[instrument(skip_all, fields(lines = cart.items().len()))]
    pub async fn calculate(&self, cart: &mut Cart) -> Result<RecalculationResult, LookupError> {
        let mut result = RecalculationResult::default();

        for item in cart.items_mut() {
            let id = item.product_class_id();
            match self.catalog.resolve(id).await? {
                None => result.add_error(Message::new(format!(
                    "Product #{id} is no longer available and cannot be purchased."
                ))),
                Some(entry) if entry.discontinued => result.add_error(Message::new(format!(
                    "{} has been discontinued and cannot be purchased.",
                    entry.name
                ))),
                Some(entry) => check_line(item, &entry, &mut result),
            }
        }

        debug!(
            errors = result.errors.len(),
            warnings = result.warnings.len(),
            "cart recalculated"
        );
        Ok(result)
    }
}

fn check_line(item: &mut CartItem, entry: &CatalogEntry, result: &mut RecalculationResult) {
    let quantity = item.quantity();
    let current = entry.price.amount;

    match item.record_price(current) {
        Some(previous) if previous != current => {
            let currency = entry.price.currency_code;
            result.add_warning(Message::new(format!(
                "The price of {} changed from {} to {}.",
                entry.name,
                Price::new(previous, currency),
                entry.price
            )));
        }
        _ => {}
    }

    match entry.stock {
        Some(0) => result.add_warning(Message::new(format!("{} is out of stock.", entry.name))),
        Some(stock) if stock < quantity => result.add_warning(Message::new(format!(
            "Only {stock} of {} left in stock; your cart has {quantity}.",
            entry.name
        ))),
        _ => {}
    }

    if let Some(limit) = entry.sale_limit.filter(|&limit| limit < quantity) {
        result.add_warning(Message::new(format!(
            "{} is limited to {limit} per order; your cart has {quantity}.",
            entry.name
        )));
    }
}
