//! HTTP application wiring (Axum router + service construction).
//!
//! This folder is structured like:
//! - `services.rs`: store selection and engine/registry wiring
//! - `routes/`: HTTP routes + handlers (one file per resource)
//! - `dto.rs`: request/response DTOs and JSON mapping helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router};

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
///
/// Store selection happens here: Postgres when `LEDGER_DATABASE_URL` is set,
/// in-memory otherwise.
pub async fn build_app() -> anyhow::Result<Router> {
    let services = Arc::new(services::build_services().await?);
    Ok(build_app_with(services))
}

/// Router over already-built services; tests inject in-memory ones here.
pub fn build_app_with(services: Arc<services::AppServices>) -> Router {
    Router::new()
        .nest("/api", routes::router())
        .layer(Extension(services))
}
