//! Business logic services for the storefront.
//!
//! # Services
//!
//! - `purchase_flow` - Recalculates a cart against the live catalog
//! - `hooks` - Extension points around the checkout lock
//! - `cart` - Cart orchestration used by the route handlers

pub mod cart;
pub mod hooks;
pub mod purchase_flow;

pub use cart::{BuystepOutcome, CartError, CartService, Recalculated};
pub use hooks::{BuystepHooks, HookContext};
pub use purchase_flow::PurchaseFlow;
