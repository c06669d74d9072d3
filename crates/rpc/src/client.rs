//! Typed client for the framed TCP transport.

use std::io;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

use stockledger_catalog::{NewProduct, Product};
use stockledger_core::{ErrorKind, ProductId};
use stockledger_engine::{CurrentStock, StockChangeReceipt};
use stockledger_ledger::{StockChange, StockTransaction};

use crate::protocol::{Reply, Request, Response, decode_reply, encode_request, frame_codec};

/// Default connect and per-call timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Error type for client operations.
#[derive(Debug)]
pub enum ClientError {
    /// The server refused the connection or the address does not resolve.
    ServerNotRunning,
    /// I/O error during communication.
    IoError(io::Error),
    /// A frame arrived that is not a valid reply.
    DecodeError(String),
    /// A request failed to serialize.
    EncodeError(String),
    /// The server reported a failed operation.
    ServerError { code: ErrorKind, message: String },
    /// The reply did not match the request that was sent.
    UnexpectedResponse(String),
    /// Operation timed out.
    Timeout,
}

impl std::fmt::Display for ClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ServerNotRunning => write!(f, "ledger server is not running"),
            Self::IoError(e) => write!(f, "I/O error: {e}"),
            Self::DecodeError(msg) => write!(f, "decode error: {msg}"),
            Self::EncodeError(msg) => write!(f, "encode error: {msg}"),
            Self::ServerError { code, message } => {
                write!(f, "server error ({code}): {message}")
            }
            Self::UnexpectedResponse(msg) => write!(f, "unexpected response: {msg}"),
            Self::Timeout => write!(f, "operation timed out"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound || err.kind() == io::ErrorKind::ConnectionRefused {
            Self::ServerNotRunning
        } else {
            Self::IoError(err)
        }
    }
}

/// Connection to a ledger RPC server, one in-flight request at a time.
///
/// Each method sends one request and waits for its reply under the configured
/// timeout. Server-side failures come back as [`ClientError::ServerError`]
/// with the same error kind the HTTP adapter would report.
#[derive(Debug)]
pub struct LedgerClient {
    framed: Framed<TcpStream, LengthDelimitedCodec>,
    timeout: Duration,
}

impl LedgerClient {
    /// Connects with the default timeout.
    pub async fn connect(addr: &str) -> Result<Self, ClientError> {
        Self::connect_with_timeout(addr, Duration::from_secs(DEFAULT_TIMEOUT_SECS)).await
    }

    /// Connects with a custom timeout, also used for every call.
    pub async fn connect_with_timeout(addr: &str, timeout: Duration) -> Result<Self, ClientError> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(ClientError::from)?;
        Ok(Self {
            framed: Framed::new(stream, frame_codec()),
            timeout,
        })
    }

    /// Registers a new product.
    pub async fn create_product(
        &mut self,
        new_product: NewProduct,
    ) -> Result<Product, ClientError> {
        match self.call(Request::CreateProduct(new_product)).await? {
            Response::Product(product) => Ok(product),
            other => Err(unexpected("product", &other)),
        }
    }

    /// Fetches one product by id.
    pub async fn product(&mut self, product_id: &ProductId) -> Result<Product, ClientError> {
        let request = Request::GetProduct {
            product_id: product_id.clone(),
        };
        match self.call(request).await? {
            Response::Product(product) => Ok(product),
            other => Err(unexpected("product", &other)),
        }
    }

    /// Applies a stock change and returns the committed receipt.
    pub async fn apply_stock_change(
        &mut self,
        change: StockChange,
    ) -> Result<StockChangeReceipt, ClientError> {
        match self.call(Request::ApplyStockChange(change)).await? {
            Response::Receipt(receipt) => Ok(receipt),
            other => Err(unexpected("receipt", &other)),
        }
    }

    /// Current stock level for a product.
    pub async fn current_stock(
        &mut self,
        product_id: &ProductId,
    ) -> Result<CurrentStock, ClientError> {
        let request = Request::GetStock {
            product_id: product_id.clone(),
        };
        match self.call(request).await? {
            Response::Stock(stock) => Ok(stock),
            other => Err(unexpected("stock", &other)),
        }
    }

    /// Movement history for one product, newest first.
    pub async fn transaction_history(
        &mut self,
        product_id: &ProductId,
        limit: Option<usize>,
    ) -> Result<Vec<StockTransaction>, ClientError> {
        let request = Request::GetTransactionHistory {
            product_id: product_id.clone(),
            limit,
        };
        match self.call(request).await? {
            Response::History(transactions) => Ok(transactions),
            other => Err(unexpected("history", &other)),
        }
    }

    /// Round-trips through the server to its store.
    pub async fn ping(&mut self) -> Result<(), ClientError> {
        match self.call(Request::Ping).await? {
            Response::Pong => Ok(()),
            other => Err(unexpected("pong", &other)),
        }
    }

    async fn call(&mut self, request: Request) -> Result<Response, ClientError> {
        let encoded =
            encode_request(&request).map_err(|e| ClientError::EncodeError(e.to_string()))?;

        tokio::time::timeout(self.timeout, self.framed.send(encoded))
            .await
            .map_err(|_| ClientError::Timeout)?
            .map_err(ClientError::from)?;

        let frame = tokio::time::timeout(self.timeout, self.framed.next())
            .await
            .map_err(|_| ClientError::Timeout)?
            .ok_or_else(|| ClientError::UnexpectedResponse("connection closed".to_string()))?
            .map_err(ClientError::from)?;

        let reply = decode_reply(&frame).map_err(|e| ClientError::DecodeError(e.to_string()))?;
        match reply {
            Reply::Ok(response) => Ok(response),
            Reply::Err(err) => Err(ClientError::ServerError {
                code: err.code,
                message: err.message,
            }),
        }
    }
}

fn unexpected(expected: &str, got: &Response) -> ClientError {
    ClientError::UnexpectedResponse(format!("expected {expected}, got {}", got.label()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connection_refused_reads_as_server_not_running() {
        let io_err = io::Error::new(io::ErrorKind::ConnectionRefused, "refused");
        let client_err: ClientError = io_err.into();
        assert!(matches!(client_err, ClientError::ServerNotRunning));
    }

    #[test]
    fn other_io_errors_pass_through() {
        let io_err = io::Error::other("broken pipe");
        let client_err: ClientError = io_err.into();
        assert!(matches!(client_err, ClientError::IoError(_)));
    }

    #[test]
    fn server_errors_render_their_code() {
        let err = ClientError::ServerError {
            code: ErrorKind::FailedPrecondition,
            message: "insufficient stock".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "server error (failed_precondition): insufficient stock"
        );
    }
}
