//! Store selection and engine wiring for the RPC server.

use std::sync::Arc;

use anyhow::Context;
use sqlx::PgPool;
use tracing::{info, warn};

use stockledger_engine::{ProductRegistry, StockLedgerEngine};
use stockledger_store::{
    InMemoryLedgerStore, InMemoryProductCatalog, LedgerStore, PgLedgerStore, PgProductCatalog,
    ProductCatalog, ensure_schema,
};

pub type SharedEngine = StockLedgerEngine<Arc<dyn LedgerStore>, Arc<dyn ProductCatalog>>;
pub type SharedRegistry = ProductRegistry<Arc<dyn ProductCatalog>>;

/// The engine and registry every connection dispatches into.
pub struct LedgerServices {
    pub engine: SharedEngine,
    pub registry: SharedRegistry,
}

impl LedgerServices {
    pub fn from_parts(store: Arc<dyn LedgerStore>, catalog: Arc<dyn ProductCatalog>) -> Self {
        Self {
            engine: StockLedgerEngine::new(store, catalog.clone()),
            registry: ProductRegistry::new(catalog),
        }
    }

    pub fn in_memory() -> Self {
        Self::from_parts(
            Arc::new(InMemoryLedgerStore::new()),
            Arc::new(InMemoryProductCatalog::new()),
        )
    }
}

/// Wire the engine against Postgres when `LEDGER_DATABASE_URL` is set, the
/// in-memory store otherwise. Same selection rule as the HTTP server, so the
/// two transports can run side by side on one database.
pub async fn build_services() -> anyhow::Result<LedgerServices> {
    match std::env::var("LEDGER_DATABASE_URL") {
        Ok(url) => {
            let pool = PgPool::connect(&url)
                .await
                .context("failed to connect to LEDGER_DATABASE_URL")?;
            ensure_schema(&pool).await?;
            info!("connected to postgres");
            Ok(LedgerServices::from_parts(
                Arc::new(PgLedgerStore::new(pool.clone())),
                Arc::new(PgProductCatalog::new(pool)),
            ))
        }
        Err(_) => {
            warn!("LEDGER_DATABASE_URL not set; stock data will not survive restarts");
            Ok(LedgerServices::in_memory())
        }
    }
}
