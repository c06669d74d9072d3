//! Stock change execution pipeline.
//!
//! `StockLedgerEngine` orchestrates every stock mutation:
//!
//! ```text
//! StockChange
//!   ↓
//! 1. Validate the change (pure, no IO)
//!   ↓
//! 2. Check the product exists in the catalog
//!   ↓
//! 3. Serialize on the per-product lock
//!   ↓
//! 4. Read the latest snapshot, compute the transition
//!   ↓
//! 5. Append the transaction conditioned on the observed version
//!   ↓
//! 6. On version conflict: back off and retry from step 4
//! ```
//!
//! ## Concurrency Model
//!
//! Two layers cooperate to keep concurrent updates serialized. The per-product
//! lock serializes writers inside this process, so a burst of updates for one
//! product queues instead of fighting. The conditional append
//! (`ExpectedVersion`) protects against writers this process cannot see, such
//! as a second engine instance on the same database. A conflict that survives
//! the retry budget surfaces as `Aborted`, which tells the caller the change
//! was not applied and can be resubmitted as-is.
//!
//! ## Failure Semantics
//!
//! The store commits a transaction and its snapshot as one atomic unit, so a
//! failed change leaves no trace: no transaction record, no level movement.
//! Every store and catalog call runs under the configured deadline; a deadline
//! miss surfaces as `Unavailable` without touching the ledger.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, instrument, warn};

use stockledger_core::{LedgerError, LedgerResult, ProductId, TransactionId};
use stockledger_ledger::{StockChange, StockSnapshot, StockTransaction, StockTransition};
use stockledger_store::{ExpectedVersion, LedgerStore, ProductCatalog, StoreError};

use crate::config::EngineConfig;

/// History page size when the caller does not supply one.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// Page size for the ledger-wide recent transaction feed.
pub const DEFAULT_RECENT_LIMIT: usize = 100;

/// Outcome of a committed stock change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChangeReceipt {
    pub transaction_id: TransactionId,
    pub previous_stock: i64,
    pub new_stock: i64,
}

/// Current stock level for one product.
///
/// A product with no recorded movements reads as zero with `snapshot` left
/// `None`, so callers can tell "never moved" apart from "drained to zero".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentStock {
    pub quantity: i64,
    pub snapshot: Option<StockSnapshot>,
}

impl From<Option<StockSnapshot>> for CurrentStock {
    fn from(snapshot: Option<StockSnapshot>) -> Self {
        let quantity = snapshot.as_ref().map(|s| s.quantity).unwrap_or(0);
        Self { quantity, snapshot }
    }
}

/// One async mutex per product, created on first use.
#[derive(Default)]
struct ProductLocks {
    inner: Mutex<HashMap<ProductId, Arc<AsyncMutex<()>>>>,
}

impl ProductLocks {
    fn lock_for(&self, product_id: &ProductId) -> LedgerResult<Arc<AsyncMutex<()>>> {
        let mut locks = self
            .inner
            .lock()
            .map_err(|_| LedgerError::internal("product lock table poisoned"))?;
        Ok(locks.entry(product_id.clone()).or_default().clone())
    }
}

/// Coordinates stock changes against a [`LedgerStore`] and a [`ProductCatalog`].
///
/// The engine is the single write path for stock levels. Adapters construct a
/// `StockChange` and hand it here; they never talk to the store directly, so
/// validation, defaulting, concurrency control and error mapping behave
/// identically regardless of transport.
///
/// Generic over the store and catalog so tests run against the in-memory
/// implementations and production against Postgres.
pub struct StockLedgerEngine<S, C> {
    store: S,
    catalog: C,
    config: EngineConfig,
    locks: ProductLocks,
}

impl<S, C> StockLedgerEngine<S, C> {
    pub fn new(store: S, catalog: C) -> Self {
        Self::with_config(store, catalog, EngineConfig::default())
    }

    pub fn with_config(store: S, catalog: C, config: EngineConfig) -> Self {
        Self {
            store,
            catalog,
            config,
            locks: ProductLocks::default(),
        }
    }
}

impl<S, C> StockLedgerEngine<S, C>
where
    S: LedgerStore,
    C: ProductCatalog,
{
    /// Apply a stock change and return the committed receipt.
    ///
    /// Failures leave the ledger untouched. `Aborted` means the retry budget
    /// was exhausted by concurrent writers; resubmitting the same change is
    /// safe.
    #[instrument(
        skip(self, change),
        fields(product_id = %change.product_id, kind = %change.kind, quantity = change.quantity),
        err
    )]
    pub async fn apply_stock_change(
        &self,
        change: StockChange,
    ) -> LedgerResult<StockChangeReceipt> {
        // 1) Reject malformed input before touching any collaborator.
        change.validate()?;
        self.ensure_product_exists(&change.product_id).await?;

        // 2) Serialize writers for this product within the process.
        let lock = self.locks.lock_for(&change.product_id)?;
        let _guard = lock.lock().await;

        let mut attempt = 0u32;
        loop {
            // 3) Read the authoritative level and decide the transition.
            let current = timed(
                self.config.store_timeout,
                self.store.latest_snapshot(&change.product_id),
            )
            .await
            .map_err(infra_error)?;
            let (previous, version) = match &current {
                Some(snapshot) => (snapshot.quantity, snapshot.version),
                None => (0, 0),
            };
            let transition = change.apply_to(previous)?;

            // 4) Commit, conditioned on the version we just observed.
            let transaction = build_transaction(&change, transition);
            let transaction_id = transaction.id.clone();
            let appended = timed(
                self.config.store_timeout,
                self.store
                    .append_commit(transaction, ExpectedVersion::Exact(version)),
            )
            .await;
            match appended {
                Ok(committed) => {
                    debug!(
                        transaction_id = %transaction_id,
                        previous_stock = transition.previous_stock,
                        new_stock = committed.quantity,
                        version = committed.version,
                        "stock change committed"
                    );
                    return Ok(StockChangeReceipt {
                        transaction_id,
                        previous_stock: transition.previous_stock,
                        new_stock: committed.quantity,
                    });
                }
                Err(err) if err.is_conflict() => {
                    attempt += 1;
                    if !self.config.retry.should_retry(attempt) {
                        warn!(attempt, "stock change aborted after repeated version conflicts");
                        return Err(LedgerError::aborted(format!(
                            "stock update for {} kept conflicting with concurrent writers; safe to resubmit",
                            change.product_id
                        )));
                    }
                    debug!(attempt, "version conflict, retrying");
                    tokio::time::sleep(self.config.retry.delay_for_attempt(attempt)).await;
                }
                Err(err) => return Err(infra_error(err)),
            }
        }
    }

    /// Current stock level for a product.
    ///
    /// Products without movements read as zero rather than failing, so this
    /// never returns not-found.
    pub async fn current_stock(&self, product_id: &ProductId) -> LedgerResult<CurrentStock> {
        let snapshot = timed(
            self.config.store_timeout,
            self.store.latest_snapshot(product_id),
        )
        .await
        .map_err(infra_error)?;
        Ok(CurrentStock::from(snapshot))
    }

    /// Movement history for one product, newest first.
    ///
    /// `limit` defaults to [`DEFAULT_HISTORY_LIMIT`] and is lifted to at
    /// least one.
    pub async fn transaction_history(
        &self,
        product_id: &ProductId,
        limit: Option<usize>,
    ) -> LedgerResult<Vec<StockTransaction>> {
        let limit = limit.unwrap_or(DEFAULT_HISTORY_LIMIT).max(1);
        timed(
            self.config.store_timeout,
            self.store.transactions_for_product(product_id, limit),
        )
        .await
        .map_err(infra_error)
    }

    /// Latest snapshot of every product with recorded movements.
    pub async fn all_stock_levels(&self) -> LedgerResult<Vec<StockSnapshot>> {
        timed(self.config.store_timeout, self.store.all_latest_snapshots())
            .await
            .map_err(infra_error)
    }

    /// Most recent transactions across all products, newest first.
    pub async fn recent_transactions(
        &self,
        limit: Option<usize>,
    ) -> LedgerResult<Vec<StockTransaction>> {
        let limit = limit.unwrap_or(DEFAULT_RECENT_LIMIT).max(1);
        timed(
            self.config.store_timeout,
            self.store.recent_transactions(limit),
        )
        .await
        .map_err(infra_error)
    }

    /// Round-trip to the backing store, for health reporting.
    pub async fn ping_store(&self) -> LedgerResult<()> {
        timed(self.config.store_timeout, self.store.ping())
            .await
            .map_err(infra_error)
    }

    async fn ensure_product_exists(&self, product_id: &ProductId) -> LedgerResult<()> {
        let found = timed(self.config.store_timeout, self.catalog.fetch(product_id))
            .await
            .map_err(infra_error)?;
        match found {
            Some(_) => Ok(()),
            None => Err(LedgerError::not_found(format!(
                "product {product_id} is not registered"
            ))),
        }
    }
}

/// Identifier and timestamp assignment happens here and nowhere else.
fn build_transaction(change: &StockChange, transition: StockTransition) -> StockTransaction {
    StockTransaction {
        id: TransactionId::generate(),
        product_id: change.product_id.clone(),
        kind: change.kind,
        quantity: change.quantity,
        quantity_before: transition.previous_stock,
        quantity_after: transition.new_stock,
        location: change.location_or_default().to_string(),
        reason: change.reason_or_default().to_string(),
        timestamp: Utc::now(),
    }
}

/// Run a store call under `deadline`; a miss becomes `StoreError::Unavailable`.
pub(crate) async fn timed<T>(
    deadline: Duration,
    call: impl Future<Output = Result<T, StoreError>>,
) -> Result<T, StoreError> {
    match tokio::time::timeout(deadline, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::unavailable(format!(
            "store call exceeded the {}ms deadline",
            deadline.as_millis()
        ))),
    }
}

/// Map store failures that are not version conflicts onto the public error
/// surface. Conflicts are handled where they occur; one reaching this function
/// is a bug and is reported as such.
pub(crate) fn infra_error(err: StoreError) -> LedgerError {
    match err {
        StoreError::Unavailable(msg) => LedgerError::unavailable(msg),
        StoreError::Conflict(msg) => LedgerError::internal(format!("unexpected conflict: {msg}")),
        StoreError::Malformed(msg) | StoreError::Backend(msg) => LedgerError::internal(msg),
    }
}
