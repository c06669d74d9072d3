//! Storage collaborators for the stock ledger.
//!
//! Two narrow async contracts, [`LedgerStore`] for the append-only ledger and
//! [`ProductCatalog`] for the product registry, with in-memory implementations
//! (tests/dev) and PostgreSQL implementations (production). Rows crossing the
//! boundary are decoded into typed records here; callers never see raw rows.

pub mod catalog;
pub mod error;
pub mod ledger;
pub mod memory;
pub mod postgres;

pub use catalog::ProductCatalog;
pub use error::StoreError;
pub use ledger::{ExpectedVersion, LedgerStore};
pub use memory::{InMemoryLedgerStore, InMemoryProductCatalog};
pub use postgres::{PgLedgerStore, PgProductCatalog, ensure_schema};
