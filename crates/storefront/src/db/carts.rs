//! `PostgreSQL` cart store.
//!
//! Carts are stored as JSONB in `storefront.cart`. Saves are conditional on
//! the `version` column; a save that matches no row is a conflict.

use async_trait::async_trait;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::instrument;

use cartflow_core::Cart;

use crate::store::{CartKey, CartStore, StoreError, StoredCart};

/// Cart store backed by the `storefront.cart` table.
#[derive(Debug, Clone)]
pub struct PgCartStore {
    pool: PgPool,
}

impl PgCartStore {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn to_version(raw: i64) -> Result<u64, StoreError> {
    u64::try_from(raw).map_err(|_| StoreError::Backend(format!("negative cart version {raw}")))
}

fn to_db_version(version: u64) -> Result<i64, StoreError> {
    i64::try_from(version)
        .map_err(|_| StoreError::Backend(format!("cart version {version} out of range")))
}

#[async_trait]
impl CartStore for PgCartStore {
    #[instrument(skip(self))]
    async fn get_cart(&self, key: CartKey) -> Result<StoredCart, StoreError> {
        let row: Option<(Json<Cart>, i64)> = sqlx::query_as(
            r"
            SELECT contents, version
            FROM storefront.cart
            WHERE cart_key = $1
            ",
        )
        .bind(key.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some((Json(cart), version)) => Ok(StoredCart::new(cart, to_version(version)?)),
            None => Ok(StoredCart::default()),
        }
    }

    #[instrument(skip(self, cart), fields(expected_version = cart.version))]
    async fn save(&self, key: CartKey, cart: &StoredCart) -> Result<StoredCart, StoreError> {
        let contents = Json(&cart.cart);

        let new_version: Option<i64> = if cart.version == 0 {
            sqlx::query_scalar(
                r"
                INSERT INTO storefront.cart (cart_key, contents, version)
                VALUES ($1, $2, 1)
                ON CONFLICT (cart_key) DO NOTHING
                RETURNING version
                ",
            )
            .bind(key.as_uuid())
            .bind(contents)
            .fetch_optional(&self.pool)
            .await?
        } else {
            sqlx::query_scalar(
                r"
                UPDATE storefront.cart
                SET contents = $2, version = version + 1, updated_at = NOW()
                WHERE cart_key = $1 AND version = $3
                RETURNING version
                ",
            )
            .bind(key.as_uuid())
            .bind(contents)
            .bind(to_db_version(cart.version)?)
            .fetch_optional(&self.pool)
            .await?
        };

        match new_version {
            Some(version) => Ok(StoredCart::new(cart.cart.clone(), to_version(version)?)),
            None => Err(StoreError::Conflict {
                key,
                expected: cart.version,
            }),
        }
    }

    #[instrument(skip(self))]
    async fn clear(&self, key: CartKey) -> Result<StoredCart, StoreError> {
        let empty = Cart::new();
        let version: i64 = sqlx::query_scalar(
            r"
            INSERT INTO storefront.cart (cart_key, contents, version)
            VALUES ($1, $2, 1)
            ON CONFLICT (cart_key) DO UPDATE
            SET contents = EXCLUDED.contents,
                version = storefront.cart.version + 1,
                updated_at = NOW()
            RETURNING version
            ",
        )
        .bind(key.as_uuid())
        .bind(Json(&empty))
        .fetch_one(&self.pool)
        .await?;

        Ok(StoredCart::new(empty, to_version(version)?))
    }

    #[instrument(skip(self))]
    async fn lock(&self, key: CartKey) -> Result<StoredCart, StoreError> {
        let mut locked_empty = Cart::new();
        locked_empty.lock();

        let (Json(cart), version): (Json<Cart>, i64) = sqlx::query_as(
            r"
            INSERT INTO storefront.cart (cart_key, contents, version)
            VALUES ($1, $2, 1)
            ON CONFLICT (cart_key) DO UPDATE
            SET contents = jsonb_set(storefront.cart.contents, '{locked}', 'true'::jsonb),
                version = storefront.cart.version + 1,
                updated_at = NOW()
            RETURNING contents, version
            ",
        )
        .bind(key.as_uuid())
        .bind(Json(&locked_empty))
        .fetch_one(&self.pool)
        .await?;

        Ok(StoredCart::new(cart, to_version(version)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_conversions() {
        assert_eq!(to_version(3).ok(), Some(3));
        assert!(to_version(-1).is_err());
        assert_eq!(to_db_version(7).ok(), Some(7));
        assert!(to_db_version(u64::MAX).is_err());
    }
}
