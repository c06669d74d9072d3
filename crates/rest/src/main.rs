use anyhow::Context;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    stockledger_observability::init();

    let app = stockledger_rest::app::build_app().await?;

    let addr = std::env::var("LEDGER_HTTP_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    tracing::info!("http server listening on {}", listener.local_addr()?);

    axum::serve(listener, app).await?;
    Ok(())
}
