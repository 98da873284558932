//! Product class repository backing catalog lookups.

use async_trait::async_trait;
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::instrument;

use cartflow_core::{CurrencyCode, Price, ProductClassId};

use super::RepositoryError;
use crate::catalog::{CatalogEntry, CatalogLookup, LookupError};

#[derive(Debug, sqlx::FromRow)]
struct ProductClassRow {
    id: ProductClassId,
    name: String,
    price: Decimal,
    currency: String,
    stock: Option<i32>,
    sale_limit: Option<i32>,
    discontinued: bool,
}

impl TryFrom<ProductClassRow> for CatalogEntry {
    type Error = RepositoryError;

    fn try_from(row: ProductClassRow) -> Result<Self, Self::Error> {
        let currency = row.currency.parse::<CurrencyCode>().map_err(|e| {
            RepositoryError::DataCorruption(format!("product class {}: {e}", row.id))
        })?;

        Ok(Self {
            product_class_id: row.id,
            name: row.name,
            price: Price::new(row.price, currency),
            stock: row.stock.map(|s| u32::try_from(s).unwrap_or(0)),
            sale_limit: row.sale_limit.and_then(|l| u32::try_from(l).ok()),
            discontinued: row.discontinued,
        })
    }
}

/// Catalog backed by `storefront.product_class`.
#[derive(Debug, Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a product class by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if the stored currency is unknown.
    pub async fn get(&self, id: ProductClassId) -> Result<Option<CatalogEntry>, RepositoryError> {
        let row: Option<ProductClassRow> = sqlx::query_as(
            r"
            SELECT id, name, price, currency, stock, sale_limit, discontinued
            FROM storefront.product_class
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CatalogEntry::try_from).transpose()
    }

    /// Insert or update a product class.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert(&self, entry: &CatalogEntry) -> Result<(), RepositoryError> {
        let stock = entry.stock.map(|s| i32::try_from(s).unwrap_or(i32::MAX));
        let sale_limit = entry.sale_limit.map(|l| i32::try_from(l).unwrap_or(i32::MAX));

        sqlx::query(
            r"
            INSERT INTO storefront.product_class
                (id, name, price, currency, stock, sale_limit, discontinued)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name,
                price = EXCLUDED.price,
                currency = EXCLUDED.currency,
                stock = EXCLUDED.stock,
                sale_limit = EXCLUDED.sale_limit,
                discontinued = EXCLUDED.discontinued,
                updated_at = NOW()
            ",
        )
        .bind(entry.product_class_id)
        .bind(&entry.name)
        .bind(entry.price.amount)
        .bind(entry.price.currency_code.code())
        .bind(stock)
        .bind(sale_limit)
        .bind(entry.discontinued)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl CatalogLookup for PgCatalog {
    #[instrument(skip(self))]
    async fn resolve(&self, id: ProductClassId) -> Result<Option<CatalogEntry>, LookupError> {
        self.get(id)
            .await
            .map_err(|e| LookupError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn row(currency: &str, stock: Option<i32>) -> ProductClassRow {
        ProductClassRow {
            id: ProductClassId::new(10),
            name: "Linen Shirt".to_string(),
            price: Decimal::new(4500, 2),
            currency: currency.to_string(),
            stock,
            sale_limit: Some(3),
            discontinued: false,
        }
    }

    #[test]
    fn test_row_conversion() {
        let entry = CatalogEntry::try_from(row("EUR", Some(4))).unwrap();
        assert_eq!(entry.price.currency_code, CurrencyCode::EUR);
        assert_eq!(entry.stock, Some(4));
        assert_eq!(entry.sale_limit, Some(3));
    }

    #[test]
    fn test_row_conversion_clamps_negative_stock() {
        let entry = CatalogEntry::try_from(row("USD", Some(-2))).unwrap();
        assert_eq!(entry.stock, Some(0));
    }

    #[test]
    fn test_row_conversion_rejects_unknown_currency() {
        let err = CatalogEntry::try_from(row("ZZZ", None)).unwrap_err();
        assert!(matches!(err, RepositoryError::DataCorruption(_)));
    }
}
