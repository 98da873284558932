//! Session-keyed cart storage with compare-and-set saves.
//!
//! Every stored cart carries a version. [`CartStore::save`] only succeeds
//! when the caller's version matches the stored one, so two requests from
//! the same session that race on read-modify-write cannot silently
//! overwrite each other: the loser gets [`StoreError::Conflict`].
//!
//! [`CartStore::clear`] and [`CartStore::lock`] are unconditional.

mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use cartflow_core::Cart;

pub use memory::MemoryCartStore;

/// Identifies one session's cart. Kept in the session, never shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartKey(Uuid);

impl CartKey {
    /// Generate a fresh random key.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    #[must_use]
    pub const fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for CartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// A cart together with the version it was read at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCart {
    pub cart: Cart,
    /// 0 means the cart has never been saved.
    pub version: u64,
}

impl StoredCart {
    #[must_use]
    pub const fn new(cart: Cart, version: u64) -> Self {
        Self { cart, version }
    }
}

/// Errors from a cart store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The cart changed since it was read.
    #[error("cart {key} was modified concurrently (expected version {expected})")]
    Conflict { key: CartKey, expected: u64 },

    /// The backend failed.
    #[error("cart store backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Durable, session-scoped cart storage.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// Current cart for `key`; an empty cart at version 0 if none is stored.
    async fn get_cart(&self, key: CartKey) -> Result<StoredCart, StoreError>;

    /// Persist `cart` if the stored version still equals `cart.version`.
    async fn save(&self, key: CartKey, cart: &StoredCart) -> Result<StoredCart, StoreError>;

    /// Reset to empty and unlocked, regardless of version.
    async fn clear(&self, key: CartKey) -> Result<StoredCart, StoreError>;

    /// Mark the stored cart locked. Idempotent.
    async fn lock(&self, key: CartKey) -> Result<StoredCart, StoreError>;
}
