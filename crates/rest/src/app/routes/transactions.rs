use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, Query},
    response::IntoResponse,
    routing::get,
};
use serde_json::{Value, json};

use stockledger_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", get(recent_transactions))
        .route("/:id", get(product_transactions))
}

pub async fn product_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(params): Query<dto::LimitQuery>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    match services
        .engine
        .transaction_history(&product_id, params.limit)
        .await
    {
        Ok(transactions) => Json(json!({
            "success": true,
            "transactions": transactions
                .iter()
                .map(dto::transaction_to_json)
                .collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn recent_transactions(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::LimitQuery>,
) -> axum::response::Response {
    let transactions = match services.engine.recent_transactions(params.limit).await {
        Ok(transactions) => transactions,
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

    let items: Vec<Value> = transactions
        .iter()
        .map(|transaction| {
            let mut value = dto::transaction_to_json(transaction);
            value["product_name"] = match names.get(&transaction.product_id) {
                Some(name) => json!(name),
                None => Value::Null,
            };
            value
        })
        .collect();

    Json(json!({ "success": true, "transactions": items })).into_response()
}
