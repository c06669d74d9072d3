use axum::{Router, routing::get};

pub mod products;
pub mod stock;
pub mod system;
pub mod transactions;

/// All ledger endpoints, mounted under `/api` by `build_app`.
pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/dashboard", get(system::dashboard))
        .nest("/products", products::router())
        .nest("/stock", stock::router())
        .nest("/transactions", transactions::router())
}
