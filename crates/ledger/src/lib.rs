//! Stock ledger domain.
//!
//! This crate contains the business rules of the ledger, implemented purely as
//! deterministic domain logic (no IO, no HTTP, no storage): transaction kinds,
//! change requests, the transition arithmetic, and the committed record types.

pub mod stock;

pub use stock::{
    DEFAULT_LOCATION, DEFAULT_REASON, StockChange, StockSnapshot, StockTransaction,
    StockTransition, TransactionKind,
};
