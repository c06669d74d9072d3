//! Product registration and lookup.

use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use stockledger_catalog::{NewProduct, Product};
use stockledger_core::{LedgerError, LedgerResult, ProductId};
use stockledger_store::ProductCatalog;

use crate::engine::{infra_error, timed};

const DEFAULT_CATALOG_TIMEOUT: Duration = Duration::from_secs(5);

/// Catalog-facing operations: registering products and reading them back.
///
/// Stock movements go through the engine; this type only owns the product
/// records those movements reference.
pub struct ProductRegistry<C> {
    catalog: C,
    catalog_timeout: Duration,
}

impl<C> ProductRegistry<C> {
    pub fn new(catalog: C) -> Self {
        Self::with_timeout(catalog, DEFAULT_CATALOG_TIMEOUT)
    }

    pub fn with_timeout(catalog: C, catalog_timeout: Duration) -> Self {
        Self {
            catalog,
            catalog_timeout,
        }
    }
}

impl<C: ProductCatalog> ProductRegistry<C> {
    /// Validate and register a new product.
    ///
    /// An explicit id that is already registered fails the precondition;
    /// generated ids are fresh by construction.
    pub async fn create_product(&self, new_product: NewProduct) -> LedgerResult<Product> {
        let product = new_product.build(Utc::now())?;
        let inserted = timed(self.catalog_timeout, self.catalog.insert(product.clone())).await;
        match inserted {
            Ok(()) => {
                debug!(product_id = %product.id, name = %product.name, "product registered");
                Ok(product)
            }
            Err(err) if err.is_conflict() => Err(LedgerError::failed_precondition(format!(
                "product {} is already registered",
                product.id
            ))),
            Err(err) => Err(infra_error(err)),
        }
    }

    /// One product by id, or not-found.
    pub async fn product(&self, product_id: &ProductId) -> LedgerResult<Product> {
        let found = timed(self.catalog_timeout, self.catalog.fetch(product_id))
            .await
            .map_err(infra_error)?;
        match found {
            Some(product) => Ok(product),
            None => Err(LedgerError::not_found(format!(
                "product {product_id} is not registered"
            ))),
        }
    }

    /// All registered products, newest first.
    pub async fn list_products(&self) -> LedgerResult<Vec<Product>> {
        timed(self.catalog_timeout, self.catalog.list())
            .await
            .map_err(infra_error)
    }
}
