use std::collections::HashMap;
use std::sync::Arc;

use axum::{Json, extract::Extension, response::IntoResponse};
use chrono::Utc;
use serde_json::{Value, json};

use stockledger_core::ProductId;
use stockledger_ledger::StockSnapshot;

use crate::app::errors;
use crate::app::services::AppServices;

/// Products below this level show up on the dashboard.
const LOW_STOCK_THRESHOLD: i64 = 10;

pub async fn health(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let database_ok = services.engine.ping_store().await.is_ok();
    Json(json!({
        "status": if database_ok { "healthy" } else { "unhealthy" },
        "database": if database_ok { "connected" } else { "disconnected" },
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}

pub async fn dashboard(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let products = match services.registry.list_products().await {
        Ok(products) => products,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    let levels = match services.engine.all_stock_levels().await {
        Ok(levels) => levels,
        Err(e) => return errors::ledger_error_to_response(e),
    };

    let names: HashMap<&ProductId, &str> = products
        .iter()
        .map(|p| (&p.id, p.name.as_str()))
        .collect();
    let prices: HashMap<&ProductId, f64> = products
        .iter()
        .map(|p| (&p.id, p.unit_price))
        .collect();

    let total_value: f64 = levels
        .iter()
        .filter_map(|s| prices.get(&s.product_id).map(|price| s.quantity as f64 * price))
        .sum();

    let mut low: Vec<&StockSnapshot> = levels
        .iter()
        .filter(|s| s.quantity < LOW_STOCK_THRESHOLD)
        .collect();
    low.sort_by_key(|s| s.quantity);
    let low_stock_items: Vec<Value> = low
        .iter()
        .filter_map(|s| {
            names.get(&s.product_id).map(|name| {
                json!({
                    "product_id": s.product_id.as_str(),
                    "name": name,
                    "quantity": s.quantity,
                })
            })
        })
        .collect();

    Json(json!({
        "total_products": products.len(),
        "total_inventory_value": total_value,
        "low_stock_items": low_stock_items,
        "timestamp": Utc::now().to_rfc3339(),
    }))
    .into_response()
}
