//! End-to-end tests: stock changes through the engine against in-memory
//! collaborators.
//!
//! Verifies:
//! - movements update the level and the history together, atomically
//! - concurrent updates to one product serialize without losing any
//! - rejected changes leave the ledger exactly as it was
//! - slow stores surface as unavailable, persistent conflicts as aborted

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use stockledger_catalog::{NewProduct, Product};
use stockledger_core::{ErrorKind, ProductId};
use stockledger_ledger::{
    DEFAULT_LOCATION, DEFAULT_REASON, StockChange, StockSnapshot, StockTransaction,
    TransactionKind,
};
use stockledger_store::{
    ExpectedVersion, InMemoryLedgerStore, InMemoryProductCatalog, LedgerStore, StoreError,
};

use crate::config::{EngineConfig, RetryPolicy};
use crate::engine::StockLedgerEngine;
use crate::registry::ProductRegistry;

type MemEngine = StockLedgerEngine<Arc<InMemoryLedgerStore>, Arc<InMemoryProductCatalog>>;
type MemRegistry = ProductRegistry<Arc<InMemoryProductCatalog>>;

fn setup() -> (MemEngine, MemRegistry, Arc<InMemoryLedgerStore>) {
    let store = Arc::new(InMemoryLedgerStore::new());
    let catalog = Arc::new(InMemoryProductCatalog::new());
    let engine = StockLedgerEngine::new(store.clone(), catalog.clone());
    let registry = ProductRegistry::new(catalog);
    (engine, registry, store)
}

async fn seeded_product(registry: &MemRegistry, name: &str) -> Product {
    registry
        .create_product(NewProduct::new(name))
        .await
        .expect("product registration failed")
}

fn receive(product_id: &ProductId, quantity: i64) -> StockChange {
    StockChange::new(product_id.clone(), TransactionKind::In, quantity)
}

#[tokio::test]
async fn receiving_stock_raises_the_level_and_records_the_movement() {
    let (engine, registry, _) = setup();
    let product = seeded_product(&registry, "Steel Bolt M6").await;

    let change = receive(&product.id, 100)
        .with_location("Dock-3")
        .with_reason("PO-4417 received");
    let receipt = engine.apply_stock_change(change).await.unwrap();

    assert_eq!(receipt.previous_stock, 0);
    assert_eq!(receipt.new_stock, 100);

    let current = engine.current_stock(&product.id).await.unwrap();
    assert_eq!(current.quantity, 100);
    let snapshot = current.snapshot.expect("a movement must leave a snapshot");
    assert_eq!(snapshot.version, 1);
    assert_eq!(snapshot.location, "Dock-3");

    let history = engine.transaction_history(&product.id, None).await.unwrap();
    assert_eq!(history.len(), 1);
    let entry = &history[0];
    assert_eq!(entry.id, receipt.transaction_id);
    assert_eq!(entry.kind, TransactionKind::In);
    assert_eq!(entry.quantity, 100);
    assert_eq!(entry.quantity_before, 0);
    assert_eq!(entry.quantity_after, 100);
    assert_eq!(entry.reason, "PO-4417 received");
}

#[tokio::test]
async fn overdrawing_fails_and_changes_nothing() {
    let (engine, registry, _) = setup();
    let product = seeded_product(&registry, "Hex Nut").await;
    engine
        .apply_stock_change(receive(&product.id, 5))
        .await
        .unwrap();

    let before_history = engine
        .transaction_history(&product.id, Some(100))
        .await
        .unwrap();
    let before_level = engine.current_stock(&product.id).await.unwrap();

    let err = engine
        .apply_stock_change(StockChange::new(
            product.id.clone(),
            TransactionKind::Out,
            10,
        ))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
    assert!(err.to_string().contains("insufficient stock"), "{err}");

    let after_history = engine
        .transaction_history(&product.id, Some(100))
        .await
        .unwrap();
    assert_eq!(after_history, before_history);
    assert_eq!(
        engine.current_stock(&product.id).await.unwrap(),
        before_level
    );
}

#[tokio::test]
async fn recount_sets_the_level_to_the_counted_quantity() {
    let (engine, registry, _) = setup();
    let product = seeded_product(&registry, "Washer").await;
    engine
        .apply_stock_change(receive(&product.id, 100))
        .await
        .unwrap();

    let receipt = engine
        .apply_stock_change(
            StockChange::new(product.id.clone(), TransactionKind::Adjustment, 42)
                .with_reason("cycle count"),
        )
        .await
        .unwrap();
    assert_eq!(receipt.previous_stock, 100);
    assert_eq!(receipt.new_stock, 42);

    // A recount matching the current level is still a recorded movement.
    let receipt = engine
        .apply_stock_change(StockChange::new(
            product.id.clone(),
            TransactionKind::Adjustment,
            42,
        ))
        .await
        .unwrap();
    assert_eq!(receipt.previous_stock, 42);
    assert_eq!(receipt.new_stock, 42);

    let history = engine.transaction_history(&product.id, None).await.unwrap();
    assert_eq!(history.len(), 3);
    assert_eq!(history[0].kind, TransactionKind::Adjustment);
    assert_eq!(engine.current_stock(&product.id).await.unwrap().quantity, 42);
}

#[tokio::test]
async fn a_product_drained_to_zero_still_has_a_stock_record() {
    let (engine, registry, _) = setup();
    let product = seeded_product(&registry, "Gasket").await;
    engine
        .apply_stock_change(receive(&product.id, 7))
        .await
        .unwrap();
    engine
        .apply_stock_change(StockChange::new(product.id.clone(), TransactionKind::Out, 7))
        .await
        .unwrap();

    let current = engine.current_stock(&product.id).await.unwrap();
    assert_eq!(current.quantity, 0);
    assert!(current.snapshot.is_some());
}

#[tokio::test]
async fn an_unmoved_product_reads_as_zero_without_a_record() {
    let (engine, registry, _) = setup();
    let product = seeded_product(&registry, "Spring").await;

    let current = engine.current_stock(&product.id).await.unwrap();
    assert_eq!(current.quantity, 0);
    assert!(current.snapshot.is_none());
    assert!(
        engine
            .transaction_history(&product.id, None)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn history_is_newest_first_and_bounded() {
    let (engine, registry, _) = setup();
    let product = seeded_product(&registry, "Bracket").await;
    for quantity in [10, 20, 30] {
        engine
            .apply_stock_change(receive(&product.id, quantity))
            .await
            .unwrap();
    }

    let history = engine
        .transaction_history(&product.id, Some(2))
        .await
        .unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].quantity, 30);
    assert_eq!(history[1].quantity, 20);

    // A zero limit is lifted to one instead of returning nothing.
    let history = engine
        .transaction_history(&product.id, Some(0))
        .await
        .unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].quantity, 30);
}

#[tokio::test]
async fn changes_for_unregistered_products_are_rejected() {
    let (engine, _, store) = setup();
    let ghost = ProductId::generate();

    let err = engine
        .apply_stock_change(receive(&ghost, 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(store.recent_transactions(10).await.unwrap().is_empty());
}

#[tokio::test]
async fn negative_quantities_never_reach_the_store() {
    let (engine, registry, store) = setup();
    let product = seeded_product(&registry, "Clip").await;

    let err = engine
        .apply_stock_change(receive(&product.id, -3))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(store.recent_transactions(10).await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn one_hundred_concurrent_receipts_all_land() {
    let (engine, registry, _) = setup();
    let product = seeded_product(&registry, "Pallet").await;
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for _ in 0..100 {
        let engine = engine.clone();
        let product_id = product.id.clone();
        handles.push(tokio::spawn(async move {
            engine.apply_stock_change(receive(&product_id, 1)).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let current = engine.current_stock(&product.id).await.unwrap();
    assert_eq!(current.quantity, 100);
    assert_eq!(current.snapshot.unwrap().version, 100);
    let history = engine
        .transaction_history(&product.id, Some(200))
        .await
        .unwrap();
    assert_eq!(history.len(), 100);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn products_do_not_contend_with_each_other() {
    let (engine, registry, _) = setup();
    let left = seeded_product(&registry, "Left Panel").await;
    let right = seeded_product(&registry, "Right Panel").await;
    let engine = Arc::new(engine);

    let mut handles = Vec::new();
    for product_id in [left.id.clone(), right.id.clone()] {
        for _ in 0..25 {
            let engine = engine.clone();
            let product_id = product_id.clone();
            handles.push(tokio::spawn(async move {
                engine.apply_stock_change(receive(&product_id, 2)).await
            }));
        }
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(engine.current_stock(&left.id).await.unwrap().quantity, 50);
    assert_eq!(engine.current_stock(&right.id).await.unwrap().quantity, 50);
}

#[tokio::test]
async fn resubmitting_an_identical_change_applies_it_again() {
    let (engine, registry, _) = setup();
    let product = seeded_product(&registry, "Label Roll").await;
    let change = receive(&product.id, 4).with_reason("restock");

    let first = engine.apply_stock_change(change.clone()).await.unwrap();
    let second = engine.apply_stock_change(change).await.unwrap();

    assert_ne!(first.transaction_id, second.transaction_id);
    assert_eq!(second.previous_stock, 4);
    assert_eq!(second.new_stock, 8);
}

#[tokio::test]
async fn blank_location_and_reason_fall_back_to_defaults() {
    let (engine, registry, _) = setup();
    let product = seeded_product(&registry, "Tape").await;

    engine
        .apply_stock_change(receive(&product.id, 1).with_location("   ").with_reason(""))
        .await
        .unwrap();

    let history = engine.transaction_history(&product.id, None).await.unwrap();
    let entry = &history[0];
    assert_eq!(entry.location, DEFAULT_LOCATION);
    assert_eq!(entry.reason, DEFAULT_REASON);
}

#[tokio::test]
async fn ledger_wide_views_cover_all_products() {
    let (engine, registry, _) = setup();
    let first = seeded_product(&registry, "Anode").await;
    let second = seeded_product(&registry, "Cathode").await;
    engine
        .apply_stock_change(receive(&first.id, 3))
        .await
        .unwrap();
    engine
        .apply_stock_change(receive(&second.id, 9))
        .await
        .unwrap();

    let levels = engine.all_stock_levels().await.unwrap();
    assert_eq!(levels.len(), 2);
    assert!(
        levels
            .iter()
            .any(|s| s.product_id == first.id && s.quantity == 3)
    );
    assert!(
        levels
            .iter()
            .any(|s| s.product_id == second.id && s.quantity == 9)
    );

    let recent = engine.recent_transactions(None).await.unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].product_id, second.id);

    engine.ping_store().await.unwrap();
}

#[tokio::test]
async fn registering_a_product_assigns_an_id_and_normalizes_the_name() {
    let (_, registry, _) = setup();
    let product = registry
        .create_product(
            NewProduct::new("  Anvil  ")
                .with_category("Forge")
                .with_unit_price(129.50),
        )
        .await
        .unwrap();

    assert!(product.id.as_str().starts_with("PROD"));
    assert_eq!(product.name, "Anvil");
    assert_eq!(product.category, "Forge");

    let fetched = registry.product(&product.id).await.unwrap();
    assert_eq!(fetched, product);
}

#[tokio::test]
async fn duplicate_product_ids_are_rejected() {
    let (_, registry, _) = setup();
    let id = ProductId::generate();
    registry
        .create_product(NewProduct::new("First").with_id(id.clone()))
        .await
        .unwrap();

    let err = registry
        .create_product(NewProduct::new("Second").with_id(id))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FailedPrecondition);
}

#[tokio::test]
async fn unknown_products_fail_lookup_with_not_found() {
    let (_, registry, _) = setup();
    let err = registry.product(&ProductId::generate()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

/// Store whose every call outlasts the engine's deadline.
struct StalledLedgerStore {
    delay: Duration,
}

#[async_trait]
impl LedgerStore for StalledLedgerStore {
    async fn latest_snapshot(
        &self,
        _product_id: &ProductId,
    ) -> Result<Option<StockSnapshot>, StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(None)
    }

    async fn append_commit(
        &self,
        _transaction: StockTransaction,
        _expected: ExpectedVersion,
    ) -> Result<StockSnapshot, StoreError> {
        tokio::time::sleep(self.delay).await;
        Err(StoreError::backend("stalled store never commits"))
    }

    async fn transactions_for_product(
        &self,
        _product_id: &ProductId,
        _limit: usize,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn recent_transactions(
        &self,
        _limit: usize,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn all_latest_snapshots(&self) -> Result<Vec<StockSnapshot>, StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(Vec::new())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

#[tokio::test]
async fn slow_stores_surface_as_unavailable() {
    let catalog = Arc::new(InMemoryProductCatalog::new());
    let registry: MemRegistry = ProductRegistry::new(catalog.clone());
    let product = seeded_product(&registry, "Cable").await;

    let engine = StockLedgerEngine::with_config(
        Arc::new(StalledLedgerStore {
            delay: Duration::from_millis(200),
        }),
        catalog,
        EngineConfig {
            store_timeout: Duration::from_millis(20),
            ..EngineConfig::default()
        },
    );

    let err = engine
        .apply_stock_change(receive(&product.id, 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);

    let err = engine.current_stock(&product.id).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unavailable);
}

/// Store that loses the version race on every append.
#[derive(Default)]
struct ContendedLedgerStore {
    appends: AtomicU32,
}

#[async_trait]
impl LedgerStore for ContendedLedgerStore {
    async fn latest_snapshot(
        &self,
        _product_id: &ProductId,
    ) -> Result<Option<StockSnapshot>, StoreError> {
        Ok(None)
    }

    async fn append_commit(
        &self,
        _transaction: StockTransaction,
        _expected: ExpectedVersion,
    ) -> Result<StockSnapshot, StoreError> {
        self.appends.fetch_add(1, Ordering::SeqCst);
        Err(StoreError::conflict("another writer got there first"))
    }

    async fn transactions_for_product(
        &self,
        _product_id: &ProductId,
        _limit: usize,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        Ok(Vec::new())
    }

    async fn recent_transactions(
        &self,
        _limit: usize,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        Ok(Vec::new())
    }

    async fn all_latest_snapshots(&self) -> Result<Vec<StockSnapshot>, StoreError> {
        Ok(Vec::new())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn exhausted_conflict_retries_surface_as_aborted() {
    let catalog = Arc::new(InMemoryProductCatalog::new());
    let registry: MemRegistry = ProductRegistry::new(catalog.clone());
    let product = seeded_product(&registry, "Drum").await;

    let store = Arc::new(ContendedLedgerStore::default());
    let engine = StockLedgerEngine::with_config(
        store.clone(),
        catalog,
        EngineConfig {
            retry: RetryPolicy {
                max_attempts: 3,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
            },
            ..EngineConfig::default()
        },
    );

    let err = engine
        .apply_stock_change(receive(&product.id, 1))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Aborted);
    assert!(err.to_string().contains("resubmit"), "{err}");
    assert_eq!(store.appends.load(Ordering::SeqCst), 3);
}
