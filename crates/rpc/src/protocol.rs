//! Wire protocol for the framed TCP transport.
//!
//! # Wire Format
//!
//! Messages travel as length-prefixed frames:
//!
//! ```text
//! +----------------------------+------------------+
//! | Length (4 bytes, BE)       | Payload          |
//! +----------------------------+------------------+
//! ```
//!
//! The payload is a JSON-encoded [`Request`] (client to server) or [`Reply`]
//! (server to client). Requests are internally tagged on `op`; a stock change
//! request, for example, reads:
//!
//! ```text
//! {"op":"apply_stock_change","product_id":"PROD1A2B3C","kind":"IN","quantity":5,...}
//! ```
//!
//! Each connection carries one request/reply exchange at a time. The payload
//! types are the ledger's own domain records, so both ends of the wire share
//! one definition of a product, a receipt and an error kind.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tokio_util::codec::LengthDelimitedCodec;

use stockledger_catalog::{NewProduct, Product};
use stockledger_core::{ErrorKind, LedgerError, ProductId};
use stockledger_engine::{CurrentStock, StockChangeReceipt};
use stockledger_ledger::{StockChange, StockTransaction};

/// Upper bound on a single frame. Both peers reject anything larger.
pub const MAX_FRAME_SIZE: usize = 1024 * 1024;

/// Length-delimited codec configured for this protocol.
pub fn frame_codec() -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .max_frame_length(MAX_FRAME_SIZE)
        .new_codec()
}

/// One client request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    CreateProduct(NewProduct),
    GetProduct { product_id: ProductId },
    ApplyStockChange(StockChange),
    GetStock { product_id: ProductId },
    GetTransactionHistory {
        product_id: ProductId,
        limit: Option<usize>,
    },
    Ping,
}

impl Request {
    pub fn label(&self) -> &'static str {
        match self {
            Self::CreateProduct(_) => "create_product",
            Self::GetProduct { .. } => "get_product",
            Self::ApplyStockChange(_) => "apply_stock_change",
            Self::GetStock { .. } => "get_stock",
            Self::GetTransactionHistory { .. } => "get_transaction_history",
            Self::Ping => "ping",
        }
    }
}

/// Payload of a successful reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Response {
    Product(Product),
    Stock(CurrentStock),
    Receipt(StockChangeReceipt),
    History(Vec<StockTransaction>),
    Pong,
}

impl Response {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Product(_) => "product",
            Self::Stock(_) => "stock",
            Self::Receipt(_) => "receipt",
            Self::History(_) => "history",
            Self::Pong => "pong",
        }
    }
}

/// A failed operation as it travels the wire.
///
/// `code` is the same machine-readable kind the HTTP adapter puts in its
/// error body, so callers switching transports keep their error handling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireError {
    pub code: ErrorKind,
    pub message: String,
}

impl From<LedgerError> for WireError {
    fn from(err: LedgerError) -> Self {
        Self {
            code: err.kind(),
            message: err.to_string(),
        }
    }
}

/// One server reply: the operation's payload or a [`WireError`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply {
    Ok(Response),
    Err(WireError),
}

pub fn encode_request(request: &Request) -> serde_json::Result<Bytes> {
    serde_json::to_vec(request).map(Bytes::from)
}

pub fn decode_request(frame: &[u8]) -> serde_json::Result<Request> {
    serde_json::from_slice(frame)
}

pub fn encode_reply(reply: &Reply) -> serde_json::Result<Bytes> {
    serde_json::to_vec(reply).map(Bytes::from)
}

pub fn decode_reply(frame: &[u8]) -> serde_json::Result<Reply> {
    serde_json::from_slice(frame)
}
