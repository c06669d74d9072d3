//! `stockledger-core` — shared foundation for the stock ledger workspace.
//!
//! Identifier newtypes and the error taxonomy every other layer maps from.
//! No infrastructure concerns live here.

pub mod error;
pub mod id;

pub use error::{ErrorKind, LedgerError, LedgerResult};
pub use id::{ProductId, TransactionId};
