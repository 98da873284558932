//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorefrontConfig;
use crate::services::CartService;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// the cart service, configuration and, in production, the database pool.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    cart: CartService,
    pool: Option<PgPool>,
}

impl AppState {
    /// Create application state without a database pool.
    ///
    /// Readiness checks then always succeed; used with in-memory stores.
    #[must_use]
    pub fn new(config: StorefrontConfig, cart: CartService) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                cart,
                pool: None,
            }),
        }
    }

    /// Create application state backed by a `PostgreSQL` pool.
    #[must_use]
    pub fn with_pool(config: StorefrontConfig, cart: CartService, pool: PgPool) -> Self {
        Self {
            inner: Arc::new(AppStateInner {
                config,
                cart,
                pool: Some(pool),
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the cart service.
    #[must_use]
    pub fn cart(&self) -> &CartService {
        &self.inner.cart
    }

    /// Get the database pool, if the state was built with one.
    #[must_use]
    pub fn pool(&self) -> Option<&PgPool> {
        self.inner.pool.as_ref()
    }
}
