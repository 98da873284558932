//! TTL cache in front of a catalog lookup.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use moka::future::Cache;
use tracing::debug;

use cartflow_core::ProductClassId;

use super::{CatalogEntry, CatalogLookup, LookupError};

/// Caches lookup results (including "not found") for a fixed TTL.
///
/// Failed lookups are not cached.
#[derive(Clone)]
pub struct CachedCatalog {
    inner: Arc<dyn CatalogLookup>,
    cache: Cache<ProductClassId, Option<CatalogEntry>>,
}

impl CachedCatalog {
    #[must_use]
    pub fn new(inner: Arc<dyn CatalogLookup>, ttl: Duration) -> Self {
        let cache = Cache::builder()
            .max_capacity(10_000)
            .time_to_live(ttl)
            .build();

        Self { inner, cache }
    }

    /// Drop a cached entry, e.g. after an admin edit.
    pub async fn invalidate(&self, id: ProductClassId) {
        self.cache.invalidate(&id).await;
    }
}

#[async_trait]
impl CatalogLookup for CachedCatalog {
    async fn resolve(&self, id: ProductClassId) -> Result<Option<CatalogEntry>, LookupError> {
        if let Some(hit) = self.cache.get(&id).await {
            debug!(product_class_id = %id, "catalog cache hit");
            return Ok(hit);
        }

        let entry = self.inner.resolve(id).await?;
        self.cache.insert(id, entry.clone()).await;
        Ok(entry)
    }
}
