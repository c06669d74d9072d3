//! The product catalog contract.

use std::sync::Arc;

use async_trait::async_trait;

use stockledger_catalog::Product;
use stockledger_core::ProductId;

use crate::error::StoreError;

/// Keyed store of registered products.
///
/// The only rule enforced here is identifier uniqueness; everything else is
/// validated before a product reaches the catalog.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Insert a product. Fails with [`StoreError::Conflict`] when the id is
    /// already taken.
    async fn insert(&self, product: Product) -> Result<(), StoreError>;

    /// Fetch a product by id.
    async fn fetch(&self, product_id: &ProductId) -> Result<Option<Product>, StoreError>;

    /// All registered products, newest first.
    async fn list(&self) -> Result<Vec<Product>, StoreError>;
}

#[async_trait]
impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    async fn insert(&self, product: Product) -> Result<(), StoreError> {
        (**self).insert(product).await
    }

    async fn fetch(&self, product_id: &ProductId) -> Result<Option<Product>, StoreError> {
        (**self).fetch(product_id).await
    }

    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        (**self).list().await
    }
}
