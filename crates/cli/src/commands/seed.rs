//! Seed the catalog with product classes from a YAML file.
//!
//! # File Format
//!
//! ```yaml
//! product_classes:
//!   - id: 10
//!     name: Canvas Tote
//!     price: "20.00"
//!     currency: USD
//!     stock: 5          # omit for unlimited
//!     sale_limit: 2     # omit for no limit
//!     discontinued: false
//! ```
//!
//! Existing product classes with the same id are updated in place.

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{error, info};

use cartflow_core::{CurrencyCode, Price, ProductClassId};
use cartflow_storefront::catalog::CatalogEntry;
use cartflow_storefront::db::{self, PgCatalog};

use super::database_url;

/// Top-level structure of a catalog seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    pub product_classes: Vec<ProductClassSeed>,
}

/// One product class in a seed file.
#[derive(Debug, Deserialize)]
pub struct ProductClassSeed {
    pub id: i32,
    pub name: String,
    pub price: Decimal,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub stock: Option<u32>,
    #[serde(default)]
    pub sale_limit: Option<u32>,
    #[serde(default)]
    pub discontinued: bool,
}

fn default_currency() -> String {
    CurrencyCode::default().code().to_string()
}

/// Validate a seed and convert it to catalog entries.
///
/// Returns every problem found rather than stopping at the first.
fn validate(seed: CatalogSeed) -> Result<Vec<CatalogEntry>, Vec<String>> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let mut entries = Vec::with_capacity(seed.product_classes.len());

    for (index, pc) in seed.product_classes.into_iter().enumerate() {
        let label = format!("product_classes[{index}] (id {})", pc.id);

        if pc.id <= 0 {
            errors.push(format!("{label}: id must be positive"));
        }
        if !seen.insert(pc.id) {
            errors.push(format!("{label}: duplicate id"));
        }
        if pc.name.trim().is_empty() {
            errors.push(format!("{label}: name must not be empty"));
        }
        if pc.price.is_sign_negative() {
            errors.push(format!("{label}: price must not be negative"));
        }

        let currency = match pc.currency.parse::<CurrencyCode>() {
            Ok(currency) => currency,
            Err(e) => {
                errors.push(format!("{label}: {e}"));
                continue;
            }
        };

        let mut entry = CatalogEntry::new(
            ProductClassId::new(pc.id),
            pc.name,
            Price::new(pc.price, currency),
        );
        if let Some(stock) = pc.stock {
            entry = entry.with_stock(stock);
        }
        if let Some(limit) = pc.sale_limit {
            entry = entry.with_sale_limit(limit);
        }
        if pc.discontinued {
            entry = entry.discontinued();
        }
        entries.push(entry);
    }

    if errors.is_empty() {
        Ok(entries)
    } else {
        Err(errors)
    }
}

/// Seed product classes from a YAML file.
///
/// # Arguments
///
/// * `file_path` - Path to the YAML seed file
/// * `dry_run` - If true, validate only and do not connect to the database
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, validation
/// fails, or database operations fail.
pub async fn catalog(file_path: &str, dry_run: bool) -> Result<(), Box<dyn std::error::Error>> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(format!("File not found: {file_path}").into());
    }

    info!(path = %file_path, "Loading catalog seed");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;

    let entries = match validate(seed) {
        Ok(entries) => entries,
        Err(errors) => {
            error!("Seed validation failed:");
            for err in &errors {
                error!("  - {err}");
            }
            return Err(format!("{} validation errors found", errors.len()).into());
        }
    };

    info!(product_classes = entries.len(), "Seed validated successfully");
    if dry_run {
        return Ok(());
    }

    let pool = db::create_pool(&database_url()?).await?;
    info!("Connected to database");

    let catalog = PgCatalog::new(pool);
    for entry in &entries {
        catalog.upsert(entry).await?;
    }

    info!("Seeding complete!");
    info!("  Product classes upserted: {}", entries.len());
    Ok(())
}
