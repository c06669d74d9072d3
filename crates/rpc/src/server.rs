//! Framed TCP server.
//!
//! Connection lifecycle:
//!
//! ```text
//! accept
//!   ↓
//! spawn one task per connection
//!   ↓
//! loop: read frame → decode Request → dispatch into the engine → write Reply
//! ```
//!
//! Dispatch reuses the same engine and registry the HTTP adapter wires up, so
//! the transports differ only in encoding. Undecodable payloads come back as
//! `invalid_argument` replies rather than dropped connections; an oversized
//! frame fails the codec and closes the connection, since the stream can no
//! longer be trusted to be frame-aligned.

use std::io;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::Framed;
use tracing::{debug, warn};

use stockledger_core::ErrorKind;

use crate::protocol::{
    Reply, Request, Response, WireError, decode_request, encode_reply, frame_codec,
};
use crate::services::LedgerServices;

/// Accept connections until the listener fails.
pub async fn serve(listener: TcpListener, services: Arc<LedgerServices>) -> io::Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        let services = services.clone();
        tokio::spawn(async move {
            debug!(%peer, "client connected");
            if let Err(err) = handle_connection(stream, &services).await {
                warn!(%peer, error = %err, "connection closed with error");
            } else {
                debug!(%peer, "client disconnected");
            }
        });
    }
}

async fn handle_connection(stream: TcpStream, services: &LedgerServices) -> io::Result<()> {
    let mut framed = Framed::new(stream, frame_codec());
    while let Some(frame) = framed.next().await {
        let frame = frame?;
        let reply = match decode_request(&frame) {
            Ok(request) => {
                debug!(op = request.label(), "dispatching request");
                dispatch(services, request).await
            }
            Err(err) => Reply::Err(WireError {
                code: ErrorKind::InvalidArgument,
                message: format!("malformed request: {err}"),
            }),
        };
        let encoded = encode_reply(&reply).map_err(io::Error::other)?;
        framed.send(encoded).await?;
    }
    Ok(())
}

async fn dispatch(services: &LedgerServices, request: Request) -> Reply {
    let result = match request {
        Request::CreateProduct(new_product) => services
            .registry
            .create_product(new_product)
            .await
            .map(Response::Product),
        Request::GetProduct { product_id } => services
            .registry
            .product(&product_id)
            .await
            .map(Response::Product),
        Request::ApplyStockChange(change) => services
            .engine
            .apply_stock_change(change)
            .await
            .map(Response::Receipt),
        Request::GetStock { product_id } => services
            .engine
            .current_stock(&product_id)
            .await
            .map(Response::Stock),
        Request::GetTransactionHistory { product_id, limit } => services
            .engine
            .transaction_history(&product_id, limit)
            .await
            .map(Response::History),
        Request::Ping => services.engine.ping_store().await.map(|()| Response::Pong),
    };
    match result {
        Ok(response) => Reply::Ok(response),
        Err(err) => Reply::Err(WireError::from(err)),
    }
}
