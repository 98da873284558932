//! In-process cart store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{CartKey, CartStore, StoreError, StoredCart};

/// Cart store backed by a map; contents are lost on restart.
///
/// Entries are never evicted: every key that was saved, cleared or locked
/// stays until the store is dropped. Meant for tests and local runs, not
/// long-lived processes.
#[derive(Debug, Default)]
pub struct MemoryCartStore {
    carts: RwLock<HashMap<CartKey, StoredCart>>,
}

impl MemoryCartStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored carts.
    pub async fn len(&self) -> usize {
        self.carts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.carts.read().await.is_empty()
    }
}

#[async_trait]
impl CartStore for MemoryCartStore {
    async fn get_cart(&self, key: CartKey) -> Result<StoredCart, StoreError> {
        Ok(self
            .carts
            .read()
            .await
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, key: CartKey, cart: &StoredCart) -> Result<StoredCart, StoreError> {
        let mut carts = self.carts.write().await;
        let current = carts.get(&key).map_or(0, |stored| stored.version);
        if current != cart.version {
            return Err(StoreError::Conflict {
                key,
                expected: cart.version,
            });
        }

        let saved = StoredCart::new(cart.cart.clone(), current + 1);
        carts.insert(key, saved.clone());
        Ok(saved)
    }

    async fn clear(&self, key: CartKey) -> Result<StoredCart, StoreError> {
        let mut carts = self.carts.write().await;
        let entry = carts.entry(key).or_default();
        entry.cart.clear();
        entry.version += 1;
        Ok(entry.clone())
    }

    async fn lock(&self, key: CartKey) -> Result<StoredCart, StoreError> {
        let mut carts = self.carts.write().await;
        let entry = carts.entry(key).or_default();
        entry.cart.lock();
        entry.version += 1;
        Ok(entry.clone())
    }
}
