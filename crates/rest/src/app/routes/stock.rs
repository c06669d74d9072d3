use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::{Value, json};

use stockledger_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(all_stock))
        .route("/update", post(update_stock))
        .route("/:id", get(get_stock))
}

pub async fn update_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::StockUpdateRequest>,
) -> axum::response::Response {
    let change = match body.into_change() {
        Ok(change) => change,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    let requested = change.quantity;

    match services.engine.apply_stock_change(change).await {
        Ok(receipt) => (
            StatusCode::OK,
            Json(dto::receipt_to_json(&receipt, requested)),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_stock(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    match services.engine.current_stock(&product_id).await {
        Ok(current) => Json(json!({
            "success": true,
            "stock": dto::stock_to_json(&product_id, &current),
        }))
        .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn all_stock(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    let levels = match services.engine.all_stock_levels().await {
        Ok(levels) => levels,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    let products = match services.registry.list_products().await {
        Ok(products) => products,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    let names: HashMap<&ProductId, &str> = products
        .iter()
        .map(|p| (&p.id, p.name.as_str()))
        .collect();

    let stock: Vec<Value> = levels
        .iter()
        .map(|snapshot| {
            let mut value = dto::snapshot_to_json(snapshot);
            value["product_name"] = match names.get(&snapshot.product_id) {
                Some(name) => json!(name),
                None => Value::Null,
            };
            value
        })
        .collect();

    Json(json!({ "success": true, "stock": stock })).into_response()
}
