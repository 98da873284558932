//! Cart orchestration: the read → mutate → recalculate → persist sequence.
//!
//! Every entry point recalculates the cart before persisting it. When the
//! recalculation reports errors the cart is cleared and the errors are
//! handed back for display; otherwise the cart is saved and warnings are
//! handed back.

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::response::Response;
use thiserror::Error;
use tracing::{info, instrument, warn};

use cartflow_core::{Cart, CartOperation, Message, ProductClassId};

use super::hooks::{BuystepHooks, HookContext};
use super::purchase_flow::PurchaseFlow;
use crate::catalog::{CatalogLookup, LookupError};
use crate::store::{CartKey, CartStore, StoreError, StoredCart};

/// Failures of a cart operation.
///
/// The first four are business outcomes shown to the user; the rest are
/// infrastructure failures for the HTTP layer.
#[derive(Debug, Error)]
pub enum CartError {
    /// The product class does not exist; the cart was not touched.
    #[error("product class {0} not found")]
    ItemNotFound(ProductClassId),

    /// The cart is locked for checkout.
    #[error("cart is locked for checkout")]
    Locked,

    /// Checkout was requested for an empty cart.
    #[error("cart is empty")]
    Empty,

    /// Another request changed the cart first.
    #[error("cart was modified concurrently")]
    Conflict,

    #[error(transparent)]
    LookupUnavailable(#[from] LookupError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for CartError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { .. } => Self::Conflict,
            other => Self::Store(other),
        }
    }
}

impl CartError {
    /// Text shown to the user on the next cart page, if any.
    #[must_use]
    pub fn user_message(&self) -> Option<Message> {
        match self {
            Self::ItemNotFound(_) | Self::LookupUnavailable(_) | Self::Store(_) => None,
            Self::Locked => Some(Message::new(
                "Your cart is being checked out and can no longer be changed.",
            )),
            Self::Empty => Some(Message::new("Your cart is empty.")),
            Self::Conflict => Some(Message::new(
                "Your cart was updated in another window. Please try again.",
            )),
        }
    }
}

/// Result of recalculating and persisting a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recalculated {
    /// No fatal errors: the cart was saved.
    Kept { cart: Cart, warnings: Vec<Message> },
    /// Fatal errors: the cart was cleared.
    Reset { errors: Vec<Message> },
}

/// Result of the checkout transition.
#[derive(Debug)]
pub enum BuystepOutcome {
    /// Cart locked; continue to checkout.
    Checkout,
    /// An after-lock hook supplied its own response.
    Override(Response),
    /// Recalculation found fatal errors: the cart was cleared, not locked,
    /// and no hook ran.
    Reset { errors: Vec<Message> },
}

/// Cart operations for one storefront.
#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn CartStore>,
    catalog: Arc<dyn CatalogLookup>,
    flow: PurchaseFlow,
    hooks: BuystepHooks,
}

impl CartService {
    #[must_use]
    pub fn new(store: Arc<dyn CartStore>, catalog: Arc<dyn CatalogLookup>) -> Self {
        let flow = PurchaseFlow::new(catalog.clone());
        Self {
            store,
            catalog,
            flow,
            hooks: BuystepHooks::default(),
        }
    }

    /// Replace the checkout hooks.
    #[must_use]
    pub fn with_hooks(mut self, hooks: BuystepHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Recalculate the cart for display.
    ///
    /// # Errors
    ///
    /// `Conflict` when another request saved first; `LookupUnavailable` and
    /// `Store` on infrastructure failure.
    #[instrument(skip(self))]
    pub async fn view(&self, key: CartKey) -> Result<Recalculated, CartError> {
        let stored = self.store.get_cart(key).await?;
        self.recalculate_and_persist(key, stored).await
    }

    /// Apply one operation to one line, then recalculate.
    ///
    /// # Errors
    ///
    /// `Locked` if checkout has begun, `ItemNotFound` if the product class
    /// does not resolve (the cart is left untouched in both cases), plus
    /// everything [`CartService::view`] can return.
    #[instrument(skip(self))]
    pub async fn handle_item(
        &self,
        key: CartKey,
        product_class_id: ProductClassId,
        operation: CartOperation,
    ) -> Result<Recalculated, CartError> {
        info!(%operation, %product_class_id, "cart item operation started");

        let mut stored = self.store.get_cart(key).await?;
        if stored.cart.is_locked() {
            info!(%operation, %product_class_id, "cart is locked, rejecting operation");
            return Err(CartError::Locked);
        }

        if self.catalog.resolve(product_class_id).await?.is_none() {
            info!(%operation, %product_class_id, "product class not found, cart unchanged");
            return Err(CartError::ItemNotFound(product_class_id));
        }

        stored.cart.apply(product_class_id, operation);
        let outcome = self.recalculate_and_persist(key, stored).await?;

        info!(%operation, %product_class_id, "cart item operation finished");
        Ok(outcome)
    }

    /// Lock the cart for checkout, firing the hooks around the lock.
    ///
    /// Only a cart that recalculates without errors is locked. A cart with
    /// fatal errors is cleared instead and comes back as
    /// [`BuystepOutcome::Reset`]. An already locked cart is not
    /// recalculated; locking it again is a no-op.
    ///
    /// # Errors
    ///
    /// `Empty` when there is nothing to check out; everything
    /// [`CartService::view`] can return.
    #[instrument(skip(self, headers))]
    pub async fn buystep(
        &self,
        key: CartKey,
        headers: &HeaderMap,
    ) -> Result<BuystepOutcome, CartError> {
        let stored = self.store.get_cart(key).await?;
        if stored.cart.is_empty() {
            return Err(CartError::Empty);
        }

        let cart = if stored.cart.is_locked() {
            stored.cart
        } else {
            match self.recalculate_and_persist(key, stored).await? {
                Recalculated::Kept { cart, warnings } => {
                    if !warnings.is_empty() {
                        info!(
                            cart_key = %key,
                            warnings = warnings.len(),
                            "checking out with cart warnings"
                        );
                    }
                    cart
                }
                Recalculated::Reset { errors } => {
                    info!(cart_key = %key, "cart reset, checkout refused");
                    return Ok(BuystepOutcome::Reset { errors });
                }
            }
        };

        self.hooks.run_before_lock(&HookContext {
            cart_key: key,
            cart: &cart,
            headers,
        });

        let locked = self.store.lock(key).await?;
        info!(cart_key = %key, version = locked.version, "cart locked for checkout");

        let response = self.hooks.run_after_lock(&HookContext {
            cart_key: key,
            cart: &locked.cart,
            headers,
        });

        Ok(response.map_or(BuystepOutcome::Checkout, BuystepOutcome::Override))
    }

    async fn recalculate_and_persist(
        &self,
        key: CartKey,
        mut stored: StoredCart,
    ) -> Result<Recalculated, CartError> {
        let result = self.flow.calculate(&mut stored.cart).await?;

        if result.has_error() {
            warn!(
                cart_key = %key,
                errors = result.errors.len(),
                "unrecoverable cart errors, clearing cart"
            );
            self.store.clear(key).await?;
            return Ok(Recalculated::Reset {
                errors: result.errors,
            });
        }

        // Nothing to persist for a session that never had a cart.
        if stored.version == 0 && stored.cart.is_empty() {
            return Ok(Recalculated::Kept {
                cart: stored.cart,
                warnings: result.warnings,
            });
        }

        let saved = self.store.save(key, &stored).await?;
        Ok(Recalculated::Kept {
            cart: saved.cart,
            warnings: result.warnings,
        })
    }
}
