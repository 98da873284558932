//! Core types for Cartflow.
//!
//! This module provides type-safe wrappers for the cart domain.

pub mod cart;
pub mod id;
pub mod message;
pub mod price;

pub use cart::{Cart, CartItem, CartOperation, CartOperationError, CartState, CartTotals};
pub use id::*;
pub use message::{Message, RecalculationResult};
pub use price::{CurrencyCode, CurrencyError, Price};
