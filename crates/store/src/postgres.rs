//! Postgres-backed store implementations.
//!
//! ## Error mapping
//!
//! SQLx errors are mapped to [`StoreError`] as follows:
//!
//! | SQLx error | PostgreSQL code | StoreError | Scenario |
//! |------------|-----------------|------------|----------|
//! | Database (unique violation) | `23505` | `Conflict` | Concurrent append (PK on `(product_id, version)`) or duplicate product id |
//! | Database (other) | any other | `Backend` | Constraint/database failures |
//! | PoolTimedOut / PoolClosed / Io / Tls | n/a | `Unavailable` | Store unreachable |
//! | Decode / ColumnDecode / ColumnNotFound / TypeNotFound | n/a | `Malformed` | Row shape mismatch |
//! | RowNotFound | n/a | `Malformed` | Should not occur (queries use fetch_optional/fetch_all) |
//!
//! ## Concurrency
//!
//! `append_commit` runs in a database transaction: it reads the current
//! snapshot version, validates the expectation, and inserts both rows. If
//! another transaction commits in between, the primary key on
//! `(product_id, version)` rejects the insert and the append surfaces a
//! `Conflict`. A caller timeout that drops the in-flight future leaves an
//! uncommitted transaction, which rolls back when the connection is recycled.
//! The pair is all-or-nothing in every path.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Postgres, Row, Transaction};
use tracing::instrument;

use stockledger_catalog::Product;
use stockledger_core::ProductId;
use stockledger_ledger::{StockSnapshot, StockTransaction};

use crate::catalog::ProductCatalog;
use crate::error::StoreError;
use crate::ledger::{ExpectedVersion, LedgerStore, snapshot_for};

const SCHEMA_STATEMENTS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS products (
        id          TEXT PRIMARY KEY,
        name        TEXT NOT NULL,
        description TEXT NOT NULL DEFAULT '',
        category    TEXT NOT NULL DEFAULT '',
        unit_price  DOUBLE PRECISION NOT NULL DEFAULT 0,
        created_at  TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_snapshots (
        product_id  TEXT NOT NULL,
        quantity    BIGINT NOT NULL CHECK (quantity >= 0),
        location    TEXT NOT NULL,
        recorded_at TIMESTAMPTZ NOT NULL,
        version     BIGINT NOT NULL CHECK (version >= 1),
        PRIMARY KEY (product_id, version)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS stock_transactions (
        id              TEXT PRIMARY KEY,
        product_id      TEXT NOT NULL,
        kind            TEXT NOT NULL,
        quantity        BIGINT NOT NULL,
        quantity_before BIGINT NOT NULL,
        quantity_after  BIGINT NOT NULL,
        location        TEXT NOT NULL,
        reason          TEXT NOT NULL,
        recorded_at     TIMESTAMPTZ NOT NULL
    )
    "#,
    r#"
    CREATE INDEX IF NOT EXISTS stock_transactions_product_recorded
        ON stock_transactions (product_id, recorded_at DESC)
    "#,
];

/// Create the ledger tables if they do not exist yet.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    for statement in SCHEMA_STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx_error("ensure_schema", e))?;
    }
    Ok(())
}

/// Postgres-backed append-only ledger store.
#[derive(Debug, Clone)]
pub struct PgLedgerStore {
    pool: Arc<PgPool>,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl LedgerStore for PgLedgerStore {
    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn latest_snapshot(
        &self,
        product_id: &ProductId,
    ) -> Result<Option<StockSnapshot>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT product_id, quantity, location, recorded_at, version
            FROM stock_snapshots
            WHERE product_id = $1
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(product_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("latest_snapshot", e))?;

        match row {
            Some(row) => {
                let snapshot_row = SnapshotRow::from_row(&row)
                    .map_err(|e| StoreError::malformed(format!("snapshot row: {e}")))?;
                Ok(Some(snapshot_row.into_snapshot()?))
            }
            None => Ok(None),
        }
    }

    #[instrument(
        skip(self, transaction),
        fields(
            product_id = %transaction.product_id,
            transaction_id = %transaction.id,
            expected = ?expected,
        ),
        err
    )]
    async fn append_commit(
        &self,
        transaction: StockTransaction,
        expected: ExpectedVersion,
    ) -> Result<StockSnapshot, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("begin_transaction", e))?;

        let current = current_version(&mut tx, &transaction.product_id).await?;
        if let Err(conflict) = expected.check(current) {
            tx.rollback()
                .await
                .map_err(|e| map_sqlx_error("rollback", e))?;
            return Err(conflict);
        }

        let snapshot = snapshot_for(&transaction, current + 1);

        sqlx::query(
            r#"
            INSERT INTO stock_snapshots (product_id, quantity, location, recorded_at, version)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(snapshot.product_id.as_str())
        .bind(snapshot.quantity)
        .bind(&snapshot.location)
        .bind(snapshot.timestamp)
        .bind(snapshot.version as i64)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::conflict(format!(
                    "concurrent append detected: version {} already exists",
                    snapshot.version
                ))
            } else {
                map_sqlx_error("insert_snapshot", e)
            }
        })?;

        sqlx::query(
            r#"
            INSERT INTO stock_transactions (
                id, product_id, kind, quantity, quantity_before, quantity_after,
                location, reason, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(transaction.id.as_str())
        .bind(transaction.product_id.as_str())
        .bind(transaction.kind.as_str())
        .bind(transaction.quantity)
        .bind(transaction.quantity_before)
        .bind(transaction.quantity_after)
        .bind(&transaction.location)
        .bind(&transaction.reason)
        .bind(transaction.timestamp)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_sqlx_error("insert_transaction", e))?;

        tx.commit()
            .await
            .map_err(|e| map_sqlx_error("commit_transaction", e))?;

        Ok(snapshot)
    }

    #[instrument(skip(self), fields(product_id = %product_id, limit), err)]
    async fn transactions_for_product(
        &self,
        product_id: &ProductId,
        limit: usize,
    ) -> Result<Vec<StockTransaction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, kind, quantity, quantity_before, quantity_after,
                   location, reason, recorded_at
            FROM stock_transactions
            WHERE product_id = $1
            ORDER BY recorded_at DESC
            LIMIT $2
            "#,
        )
        .bind(product_id.as_str())
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("transactions_for_product", e))?;

        decode_transactions(rows)
    }

    #[instrument(skip(self), fields(limit), err)]
    async fn recent_transactions(&self, limit: usize) -> Result<Vec<StockTransaction>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, product_id, kind, quantity, quantity_before, quantity_after,
                   location, reason, recorded_at
            FROM stock_transactions
            ORDER BY recorded_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit as i64)
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("recent_transactions", e))?;

        decode_transactions(rows)
    }

    #[instrument(skip(self), err)]
    async fn all_latest_snapshots(&self) -> Result<Vec<StockSnapshot>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT DISTINCT ON (product_id)
                   product_id, quantity, location, recorded_at, version
            FROM stock_snapshots
            ORDER BY product_id, version DESC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("all_latest_snapshots", e))?;

        let mut snapshots = Vec::with_capacity(rows.len());
        for row in rows {
            let snapshot_row = SnapshotRow::from_row(&row)
                .map_err(|e| StoreError::malformed(format!("snapshot row: {e}")))?;
            snapshots.push(snapshot_row.into_snapshot()?);
        }
        Ok(snapshots)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("ping", e))?;
        Ok(())
    }
}

/// Postgres-backed product catalog.
#[derive(Debug, Clone)]
pub struct PgProductCatalog {
    pool: Arc<PgPool>,
}

impl PgProductCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool: Arc::new(pool),
        }
    }
}

#[async_trait::async_trait]
impl ProductCatalog for PgProductCatalog {
    #[instrument(skip(self, product), fields(product_id = %product.id), err)]
    async fn insert(&self, product: Product) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO products (id, name, description, category, unit_price, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(product.id.as_str())
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.category)
        .bind(product.unit_price)
        .bind(product.created_at)
        .execute(&*self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                StoreError::conflict(format!("product id already registered: {}", product.id))
            } else {
                map_sqlx_error("insert_product", e)
            }
        })?;
        Ok(())
    }

    #[instrument(skip(self), fields(product_id = %product_id), err)]
    async fn fetch(&self, product_id: &ProductId) -> Result<Option<Product>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, name, description, category, unit_price, created_at
            FROM products
            WHERE id = $1
            "#,
        )
        .bind(product_id.as_str())
        .fetch_optional(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("fetch_product", e))?;

        match row {
            Some(row) => {
                let product_row = ProductRow::from_row(&row)
                    .map_err(|e| StoreError::malformed(format!("product row: {e}")))?;
                Ok(Some(product_row.into_product()?))
            }
            None => Ok(None),
        }
    }

    #[instrument(skip(self), err)]
    async fn list(&self) -> Result<Vec<Product>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, description, category, unit_price, created_at
            FROM products
            ORDER BY created_at DESC, id ASC
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_products", e))?;

        let mut products = Vec::with_capacity(rows.len());
        for row in rows {
            let product_row = ProductRow::from_row(&row)
                .map_err(|e| StoreError::malformed(format!("product row: {e}")))?;
            products.push(product_row.into_product()?);
        }
        Ok(products)
    }
}

/// Current snapshot version for a product inside an open transaction.
/// 0 when the product has no snapshots.
async fn current_version(
    tx: &mut Transaction<'_, Postgres>,
    product_id: &ProductId,
) -> Result<u64, StoreError> {
    let row = sqlx::query(
        r#"
        SELECT COALESCE(MAX(version), 0) AS current_version
        FROM stock_snapshots
        WHERE product_id = $1
        "#,
    )
    .bind(product_id.as_str())
    .fetch_one(&mut **tx)
    .await
    .map_err(|e| map_sqlx_error("current_version", e))?;

    let current: i64 = row
        .try_get("current_version")
        .map_err(|e| StoreError::malformed(format!("current_version column: {e}")))?;
    Ok(current as u64)
}

fn decode_transactions(
    rows: Vec<sqlx::postgres::PgRow>,
) -> Result<Vec<StockTransaction>, StoreError> {
    let mut transactions = Vec::with_capacity(rows.len());
    for row in rows {
        let tx_row = TransactionRow::from_row(&row)
            .map_err(|e| StoreError::malformed(format!("transaction row: {e}")))?;
        transactions.push(tx_row.into_transaction()?);
    }
    Ok(transactions)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {operation}: {}", db_err.message());
            if let Some(code) = db_err.code() {
                if code.as_ref() == "23505" {
                    return StoreError::Conflict(msg);
                }
            }
            StoreError::Backend(msg)
        }
        sqlx::Error::PoolTimedOut => {
            StoreError::Unavailable(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::Io(e) => StoreError::Unavailable(format!("io error in {operation}: {e}")),
        sqlx::Error::Tls(e) => StoreError::Unavailable(format!("tls error in {operation}: {e}")),
        sqlx::Error::RowNotFound => {
            StoreError::Malformed(format!("unexpected empty result in {operation}"))
        }
        sqlx::Error::Decode(e) => StoreError::Malformed(format!("decode error in {operation}: {e}")),
        sqlx::Error::ColumnDecode { index, source } => StoreError::Malformed(format!(
            "column decode error in {operation} at {index}: {source}"
        )),
        sqlx::Error::ColumnNotFound(col) => {
            StoreError::Malformed(format!("column {col} missing in {operation}"))
        }
        other => StoreError::Backend(format!("sqlx error in {operation}: {other}")),
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            return code.as_ref() == "23505";
        }
    }
    false
}

// SQLx row types. These are the typed accessors at the store boundary; the
// rest of the system never touches raw rows.

#[derive(Debug)]
struct SnapshotRow {
    product_id: String,
    quantity: i64,
    location: String,
    recorded_at: DateTime<Utc>,
    version: i64,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for SnapshotRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(SnapshotRow {
            product_id: row.try_get("product_id")?,
            quantity: row.try_get("quantity")?,
            location: row.try_get("location")?,
            recorded_at: row.try_get("recorded_at")?,
            version: row.try_get("version")?,
        })
    }
}

impl SnapshotRow {
    fn into_snapshot(self) -> Result<StockSnapshot, StoreError> {
        let product_id = self
            .product_id
            .parse()
            .map_err(|e| StoreError::malformed(format!("snapshot product_id: {e}")))?;
        Ok(StockSnapshot {
            product_id,
            quantity: self.quantity,
            location: self.location,
            timestamp: self.recorded_at,
            version: self.version as u64,
        })
    }
}

#[derive(Debug)]
struct TransactionRow {
    id: String,
    product_id: String,
    kind: String,
    quantity: i64,
    quantity_before: i64,
    quantity_after: i64,
    location: String,
    reason: String,
    recorded_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for TransactionRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(TransactionRow {
            id: row.try_get("id")?,
            product_id: row.try_get("product_id")?,
            kind: row.try_get("kind")?,
            quantity: row.try_get("quantity")?,
            quantity_before: row.try_get("quantity_before")?,
            quantity_after: row.try_get("quantity_after")?,
            location: row.try_get("location")?,
            reason: row.try_get("reason")?,
            recorded_at: row.try_get("recorded_at")?,
        })
    }
}

impl TransactionRow {
    fn into_transaction(self) -> Result<StockTransaction, StoreError> {
        let id = self
            .id
            .parse()
            .map_err(|e| StoreError::malformed(format!("transaction id: {e}")))?;
        let product_id = self
            .product_id
            .parse()
            .map_err(|e| StoreError::malformed(format!("transaction product_id: {e}")))?;
        let kind = self
            .kind
            .parse()
            .map_err(|e| StoreError::malformed(format!("transaction kind: {e}")))?;
        Ok(StockTransaction {
            id,
            product_id,
            kind,
            quantity: self.quantity,
            quantity_before: self.quantity_before,
            quantity_after: self.quantity_after,
            location: self.location,
            reason: self.reason,
            timestamp: self.recorded_at,
        })
    }
}

#[derive(Debug)]
struct ProductRow {
    id: String,
    name: String,
    description: String,
    category: String,
    unit_price: f64,
    created_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, sqlx::postgres::PgRow> for ProductRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(ProductRow {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            category: row.try_get("category")?,
            unit_price: row.try_get("unit_price")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl ProductRow {
    fn into_product(self) -> Result<Product, StoreError> {
        let id = self
            .id
            .parse()
            .map_err(|e| StoreError::malformed(format!("product id: {e}")))?;
        Ok(Product {
            id,
            name: self.name,
            description: self.description,
            category: self.category,
            unit_price: self.unit_price,
            created_at: self.created_at,
        })
    }
}
