use std::sync::Arc;

use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockledger_observability::init();

    let services = stockledger_rpc::services::build_services().await?;

    let addr = std::env::var("LEDGER_RPC_ADDR").unwrap_or_else(|_| "0.0.0.0:50051".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("rpc server listening on {}", listener.local_addr()?);

    stockledger_rpc::serve(listener, Arc::new(services))
        .await
        .context("rpc server terminated")
}
