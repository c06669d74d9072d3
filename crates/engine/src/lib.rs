//! `stockledger-engine` — orchestration over the store and catalog.
//!
//! The engine is the only write path for stock levels: adapters build a
//! `StockChange` and hand it to [`StockLedgerEngine`], which validates it,
//! serializes concurrent writers, commits through the store and maps failures
//! onto the shared error surface. [`ProductRegistry`] does the same for
//! product records. Transports stay thin; everything they have in common
//! lives here.

pub mod config;
pub mod engine;
pub mod registry;

pub use config::{EngineConfig, RetryPolicy};
pub use engine::{
    CurrentStock, DEFAULT_HISTORY_LIMIT, DEFAULT_RECENT_LIMIT, StockChangeReceipt,
    StockLedgerEngine,
};
pub use registry::ProductRegistry;

#[cfg(test)]
mod integration_tests;
