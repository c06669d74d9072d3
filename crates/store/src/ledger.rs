//! The ledger store contract.

use std::sync::Arc;

use async_trait::async_trait;

use stockledger_core::ProductId;
use stockledger_ledger::{StockSnapshot, StockTransaction};

use crate::error::StoreError;

/// Optimistic concurrency expectation for a product's snapshot stream.
///
/// Snapshot versions start at 1; `actual` is 0 when no snapshot exists yet,
/// so `Exact(0)` expresses "this product has no stock record".
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ExpectedVersion {
    /// Skip version checking (seeding, maintenance tooling).
    Any,
    /// Require the stream to be at an exact version.
    Exact(u64),
}

impl ExpectedVersion {
    pub fn matches(self, actual: u64) -> bool {
        match self {
            ExpectedVersion::Any => true,
            ExpectedVersion::Exact(v) => v == actual,
        }
    }

    pub fn check(self, actual: u64) -> Result<(), StoreError> {
        if self.matches(actual) {
            Ok(())
        } else {
            Err(StoreError::conflict(format!(
                "expected version {self:?}, found {actual}"
            )))
        }
    }
}

/// Append-only store of stock snapshots and transactions.
///
/// Streams are keyed by product. Within a stream, snapshot versions increase
/// monotonically; the store assigns them during append.
///
/// ## Append semantics
///
/// `append_commit`:
/// - derives the snapshot from the transaction (`quantity_after`, location,
///   timestamp), so the pair can never disagree
/// - checks the expected version against the product's current snapshot
///   version
/// - assigns the next version and persists snapshot + transaction as one
///   atomic unit; on any failure, neither row exists
///
/// ## Read semantics
///
/// Reads do not participate in the writers' critical section and may trail
/// an in-flight append. History queries are bounded and ordered newest first.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Latest snapshot for a product, or `None` if it has no stock record.
    async fn latest_snapshot(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<StockSnapshot>, StoreError>;

    /// Atomically append `transaction` and the snapshot it produces.
    ///
    /// Fails with [`StoreError::Conflict`] when `expected` does not match the
    /// product's current snapshot version; nothing is written in that case.
    /// Returns the committed snapshot with its assigned version.
    async fn append_commit(
        &self,
        transaction: StockTransaction,
        expected: ExpectedVersion,
    ) -> Result<StockSnapshot, StoreError>;

    /// Transactions for one product, newest first, at most `limit`.
    async fn transactions_for_product(
        &self,
        product_id: &ProductId,
        limit: usize,
    ) -> Result<Vec<StockTransaction>, StoreError>;

    /// Most recent transactions across all products, newest first, at most
    /// `limit`.
    async fn recent_transactions(&self, limit: usize) -> Result<Vec<StockTransaction>, StoreError>;

    /// Current snapshot of every product that has one, ordered by product id.
    async fn all_latest_snapshots(&self) -> Result<Vec<StockSnapshot>, StoreError>;

    /// Liveness probe.
    async fn ping(&self) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> LedgerStore for Arc<S>
where
    S: LedgerStore + ?Sized,
{
    async fn latest_snapshot(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<StockSnapshot>, StoreError> {
        (**self).latest_snapshot(product_id).await
    }

    async fn append_commit(
        &self,
        transaction: StockTransaction,
        expected: ExpectedVersion,
    ) -> Result<StockSnapshot, StoreError> {
        (**self).append_commit(transaction, expected).await
    }

    async fn transactions_for_product(
        &self,
        product_id: &ProductId,
        limit: usize,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        (**self).transactions_for_product(product_id, limit).await
    }

    async fn recent_transactions(&self, limit: usize) -> Result<Vec<StockTransaction>, StoreError> {
        (**self).recent_transactions(limit).await
    }

    async fn all_latest_snapshots(&self) -> Result<Vec<StockSnapshot>, StoreError> {
        (**self).all_latest_snapshots().await
    }

    async fn ping(&self) -> Result<(), StoreError> {
        (**self).ping().await
    }
}

/// Derive the snapshot a transaction produces. Version is assigned by the
/// store during append.
pub(crate) fn snapshot_for(transaction: &StockTransaction, version: u64) -> StockSnapshot {
    StockSnapshot {
        product_id: transaction.product_id.clone(),
        quantity: transaction.quantity_after,
        location: transaction.location.clone(),
        timestamp: transaction.timestamp,
        version,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expected_version_matching() {
        assert!(ExpectedVersion::Any.matches(0));
        assert!(ExpectedVersion::Any.matches(7));
        assert!(ExpectedVersion::Exact(3).matches(3));
        assert!(!ExpectedVersion::Exact(3).matches(4));
        assert!(ExpectedVersion::Exact(0).matches(0));
    }

    #[test]
    fn expected_version_check_reports_conflict() {
        let err = ExpectedVersion::Exact(2).check(5).unwrap_err();
        assert!(err.is_conflict());
    }
}
