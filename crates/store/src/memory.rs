//! In-memory store implementations.
//!
//! Intended for tests/dev. The ledger keeps all state behind one lock so the
//! snapshot+transaction append is atomic by construction.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use stockledger_catalog::Product;
use stockledger_core::ProductId;
use stockledger_ledger::{StockSnapshot, StockTransaction};

use crate::catalog::ProductCatalog;
use crate::error::StoreError;
use crate::ledger::{ExpectedVersion, LedgerStore, snapshot_for};

#[derive(Debug, Default)]
struct LedgerState {
    snapshots: HashMap<ProductId, Vec<StockSnapshot>>,
    transactions: Vec<StockTransaction>,
}

/// In-memory append-only ledger store.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    state: RwLock<LedgerState>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn latest_snapshot(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<StockSnapshot>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        Ok(state
            .snapshots
            .get(product_id)
            .and_then(|stream| stream.last())
            .cloned())
    }

    async fn append_commit(
        &self,
        transaction: StockTransaction,
        expected: ExpectedVersion,
    ) -> Result<StockSnapshot, StoreError> {
        let mut state = self
            .state
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))?;

        let current = state
            .snapshots
            .get(&transaction.product_id)
            .and_then(|stream| stream.last())
            .map(|s| s.version)
            .unwrap_or(0);
        expected.check(current)?;

        let snapshot = snapshot_for(&transaction, current + 1);
        state
            .snapshots
            .entry(transaction.product_id.clone())
            .or_default()
            .push(snapshot.clone());
        state.transactions.push(transaction);

        Ok(snapshot)
    }

    async fn transactions_for_product(
        &self,
        product_id: &ProductId,
        limit: usize,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|t| &t.product_id == product_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn recent_transactions(&self, limit: usize) -> Result<Vec<StockTransaction>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        Ok(state.transactions.iter().rev().take(limit).cloned().collect())
    }

    async fn all_latest_snapshots(&self) -> Result<Vec<StockSnapshot>, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        let mut latest: Vec<StockSnapshot> = state
            .snapshots
            .values()
            .filter_map(|stream| stream.last())
            .cloned()
            .collect();
        latest.sort_by(|a, b| a.product_id.as_str().cmp(b.product_id.as_str()));
        Ok(latest)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-memory product catalog.
#[derive(Debug, Default)]
pub struct InMemoryProductCatalog {
    products: RwLock<HashMap<ProductId, Product>>,
}

impl InMemoryProductCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductCatalog {
    async fn insert(&self, product: Product) -> Result<(), StoreError> {
        let mut products = self
            .products
            .write()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        if products.contains_key(&product.id) {
            return Err(StoreError::conflict(format!(
                "product id already registered: {}",
                product.id
            )));
        }
        products.insert(product.id.clone(), product);
        Ok(())
    }

    async fn fetch(&self, product_id: &ProductId) -> Result<Option<Product>, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        Ok(products.get(product_id).cloned())
    }

    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let products = self
            .products
            .read()
            .map_err(|_| StoreError::backend("lock poisoned"))?;
        let mut all: Vec<Product> = products.values().cloned().collect();
        all.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use stockledger_catalog::NewProduct;
    use stockledger_core::TransactionId;
    use stockledger_ledger::{DEFAULT_LOCATION, DEFAULT_REASON, TransactionKind};

    fn tx(
        product: &str,
        kind: TransactionKind,
        qty: i64,
        before: i64,
        after: i64,
    ) -> StockTransaction {
        StockTransaction {
            id: TransactionId::generate(),
            product_id: product.parse().unwrap(),
            kind,
            quantity: qty,
            quantity_before: before,
            quantity_after: after,
            location: DEFAULT_LOCATION.to_string(),
            reason: DEFAULT_REASON.to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn append_assigns_monotonic_versions() {
        let store = InMemoryLedgerStore::new();

        let s1 = store
            .append_commit(
                tx("PRODAAA111", TransactionKind::Adjustment, 10, 0, 10),
                ExpectedVersion::Exact(0),
            )
            .await
            .unwrap();
        assert_eq!(s1.version, 1);
        assert_eq!(s1.quantity, 10);

        let s2 = store
            .append_commit(
                tx("PRODAAA111", TransactionKind::In, 5, 10, 15),
                ExpectedVersion::Exact(1),
            )
            .await
            .unwrap();
        assert_eq!(s2.version, 2);
        assert_eq!(s2.quantity, 15);

        let latest = store
            .latest_snapshot(&"PRODAAA111".parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(latest.version, 2);
        assert_eq!(latest.quantity, 15);
    }

    #[tokio::test]
    async fn missing_product_has_no_snapshot() {
        let store = InMemoryLedgerStore::new();
        let latest = store
            .latest_snapshot(&"PRODZZZ999".parse().unwrap())
            .await
            .unwrap();
        assert!(latest.is_none());
    }

    #[tokio::test]
    async fn stale_expected_version_is_rejected_and_writes_nothing() {
        let store = InMemoryLedgerStore::new();
        let product: ProductId = "PRODAAA111".parse().unwrap();

        store
            .append_commit(
                tx("PRODAAA111", TransactionKind::Adjustment, 10, 0, 10),
                ExpectedVersion::Exact(0),
            )
            .await
            .unwrap();

        let err = store
            .append_commit(
                tx("PRODAAA111", TransactionKind::In, 5, 10, 15),
                ExpectedVersion::Exact(0),
            )
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        let latest = store.latest_snapshot(&product).await.unwrap().unwrap();
        assert_eq!(latest.version, 1);
        assert_eq!(latest.quantity, 10);
        let history = store.transactions_for_product(&product, 50).await.unwrap();
        assert_eq!(history.len(), 1);
    }

    #[tokio::test]
    async fn any_expectation_bypasses_version_check() {
        let store = InMemoryLedgerStore::new();
        store
            .append_commit(
                tx("PRODAAA111", TransactionKind::Adjustment, 10, 0, 10),
                ExpectedVersion::Any,
            )
            .await
            .unwrap();
        let s2 = store
            .append_commit(
                tx("PRODAAA111", TransactionKind::In, 1, 10, 11),
                ExpectedVersion::Any,
            )
            .await
            .unwrap();
        assert_eq!(s2.version, 2);
    }

    #[tokio::test]
    async fn products_have_independent_version_streams() {
        let store = InMemoryLedgerStore::new();
        store
            .append_commit(
                tx("PRODAAA111", TransactionKind::Adjustment, 10, 0, 10),
                ExpectedVersion::Exact(0),
            )
            .await
            .unwrap();
        let other = store
            .append_commit(
                tx("PRODBBB222", TransactionKind::Adjustment, 3, 0, 3),
                ExpectedVersion::Exact(0),
            )
            .await
            .unwrap();
        assert_eq!(other.version, 1);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_bounded() {
        let store = InMemoryLedgerStore::new();
        let product: ProductId = "PRODAAA111".parse().unwrap();

        store
            .append_commit(
                tx("PRODAAA111", TransactionKind::Adjustment, 100, 0, 100),
                ExpectedVersion::Exact(0),
            )
            .await
            .unwrap();
        store
            .append_commit(
                tx("PRODAAA111", TransactionKind::Out, 30, 100, 70),
                ExpectedVersion::Exact(1),
            )
            .await
            .unwrap();
        store
            .append_commit(
                tx("PRODAAA111", TransactionKind::In, 50, 70, 120),
                ExpectedVersion::Exact(2),
            )
            .await
            .unwrap();

        let history = store.transactions_for_product(&product, 50).await.unwrap();
        assert_eq!(history.len(), 3);
        assert_eq!(history[0].kind, TransactionKind::In);
        assert_eq!(history[1].kind, TransactionKind::Out);
        assert_eq!(history[2].kind, TransactionKind::Adjustment);

        let capped = store.transactions_for_product(&product, 1).await.unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].kind, TransactionKind::In);
    }

    #[tokio::test]
    async fn recent_transactions_span_products() {
        let store = InMemoryLedgerStore::new();
        store
            .append_commit(
                tx("PRODAAA111", TransactionKind::Adjustment, 10, 0, 10),
                ExpectedVersion::Exact(0),
            )
            .await
            .unwrap();
        store
            .append_commit(
                tx("PRODBBB222", TransactionKind::Adjustment, 20, 0, 20),
                ExpectedVersion::Exact(0),
            )
            .await
            .unwrap();

        let recent = store.recent_transactions(10).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].product_id.as_str(), "PRODBBB222");
        assert_eq!(recent[1].product_id.as_str(), "PRODAAA111");
    }

    #[tokio::test]
    async fn all_latest_snapshots_returns_one_per_product() {
        let store = InMemoryLedgerStore::new();
        store
            .append_commit(
                tx("PRODAAA111", TransactionKind::Adjustment, 10, 0, 10),
                ExpectedVersion::Exact(0),
            )
            .await
            .unwrap();
        store
            .append_commit(
                tx("PRODAAA111", TransactionKind::In, 5, 10, 15),
                ExpectedVersion::Exact(1),
            )
            .await
            .unwrap();
        store
            .append_commit(
                tx("PRODBBB222", TransactionKind::Adjustment, 7, 0, 7),
                ExpectedVersion::Exact(0),
            )
            .await
            .unwrap();

        let all = store.all_latest_snapshots().await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].product_id.as_str(), "PRODAAA111");
        assert_eq!(all[0].quantity, 15);
        assert_eq!(all[1].product_id.as_str(), "PRODBBB222");
        assert_eq!(all[1].quantity, 7);
    }

    #[tokio::test]
    async fn catalog_enforces_unique_ids() {
        let catalog = InMemoryProductCatalog::new();
        let product = NewProduct::new("Laptop")
            .with_id("PRODAAA111".parse().unwrap())
            .build(Utc::now())
            .unwrap();

        catalog.insert(product.clone()).await.unwrap();
        let err = catalog.insert(product).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn catalog_fetch_and_list() {
        let catalog = InMemoryProductCatalog::new();
        assert!(
            catalog
                .fetch(&"PRODAAA111".parse().unwrap())
                .await
                .unwrap()
                .is_none()
        );

        let product = NewProduct::new("Laptop")
            .with_id("PRODAAA111".parse().unwrap())
            .build(Utc::now())
            .unwrap();
        catalog.insert(product.clone()).await.unwrap();

        let fetched = catalog
            .fetch(&"PRODAAA111".parse().unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.name, "Laptop");
        assert_eq!(catalog.list().await.unwrap().len(), 1);
    }
}
