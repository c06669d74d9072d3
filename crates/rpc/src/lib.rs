//! stockledger-rpc — framed TCP transport for the stock ledger.
//!
//! Serves the same operations as the HTTP adapter over length-prefixed JSON
//! frames, and ships the typed [`LedgerClient`] other services use to call it.

pub mod client;
pub mod protocol;
pub mod server;
pub mod services;

pub use client::{ClientError, LedgerClient};
pub use protocol::{MAX_FRAME_SIZE, Reply, Request, Response, WireError};
pub use server::serve;
pub use services::LedgerServices;
