//! Catalog lookup: resolves a product class to its current price and stock.
//!
//! # Implementations
//!
//! - [`InMemoryCatalog`] - fixed entries, used by tests and local seeding
//! - [`crate::db::catalog::PgCatalog`] - the `storefront.product_class` table
//! - [`CachedCatalog`] - wraps any lookup in a `moka` TTL cache

mod cache;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::RwLock;

use cartflow_core::{Price, ProductClassId};

pub use cache::CachedCatalog;

/// Catalog backend could not be reached.
///
/// Never retried inside the cart subsystem; the HTTP layer turns it into a 503.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    #[error("catalog lookup unavailable: {0}")]
    Unavailable(String),
}

/// Current catalog state of one product class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub product_class_id: ProductClassId,
    pub name: String,
    pub price: Price,
    /// Units on hand; `None` means unlimited.
    #[serde(default)]
    pub stock: Option<u32>,
    /// Maximum units per order; `None` means no limit.
    #[serde(default)]
    pub sale_limit: Option<u32>,
    /// Permanently withdrawn from sale.
    #[serde(default)]
    pub discontinued: bool,
}

impl CatalogEntry {
    /// A purchasable entry with unlimited stock and no sale limit.
    #[must_use]
    pub fn new(product_class_id: ProductClassId, name: impl Into<String>, price: Price) -> Self {
        Self {
            product_class_id,
            name: name.into(),
            price,
            stock: None,
            sale_limit: None,
            discontinued: false,
        }
    }

    #[must_use]
    pub const fn with_stock(mut self, stock: u32) -> Self {
        self.stock = Some(stock);
        self
    }

    #[must_use]
    pub const fn with_sale_limit(mut self, limit: u32) -> Self {
        self.sale_limit = Some(limit);
        self
    }

    #[must_use]
    pub const fn discontinued(mut self) -> Self {
        self.discontinued = true;
        self
    }
}

/// Resolves product classes against the live catalog.
#[async_trait]
pub trait CatalogLookup: Send + Sync {
    /// Look up one product class. `Ok(None)` means it does not exist.
    async fn resolve(&self, id: ProductClassId) -> Result<Option<CatalogEntry>, LookupError>;
}

#[async_trait]
impl<T: CatalogLookup + ?Sized> CatalogLookup for Arc<T> {
    async fn resolve(&self, id: ProductClassId) -> Result<Option<CatalogEntry>, LookupError> {
        (**self).resolve(id).await
    }
}

/// Catalog held in memory.
///
/// Entries can be replaced at runtime, which tests use to simulate price
/// changes and discontinued products between requests.
#[derive(Debug, Default)]
pub struct InMemoryCatalog {
    entries: RwLock<HashMap<ProductClassId, CatalogEntry>>,
    unavailable: RwLock<bool>,
}

impl InMemoryCatalog {
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = CatalogEntry>) -> Self {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|entry| (entry.product_class_id, entry))
                    .collect(),
            ),
            unavailable: RwLock::new(false),
        }
    }

    /// Insert or replace an entry.
    pub async fn upsert(&self, entry: CatalogEntry) {
        self.entries
            .write()
            .await
            .insert(entry.product_class_id, entry);
    }

    /// Delete an entry so that it no longer resolves.
    pub async fn remove(&self, id: ProductClassId) {
        self.entries.write().await.remove(&id);
    }

    /// Make every lookup fail with [`LookupError::Unavailable`].
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }
}

#[async_trait]
impl CatalogLookup for InMemoryCatalog {
    async fn resolve(&self, id: ProductClassId) -> Result<Option<CatalogEntry>, LookupError> {
        if *self.unavailable.read().await {
            return Err(LookupError::Unavailable("in-memory catalog offline".into()));
        }
        Ok(self.entries.read().await.get(&id).cloned())
    }
}
