use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde_json::json;

use stockledger_catalog::NewProduct;
use stockledger_core::ProductId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_product).get(list_products))
        .route("/:id", get(get_product))
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<dto::CreateProductRequest>,
) -> axum::response::Response {
    let mut new_product = NewProduct::new(body.name)
        .with_description(body.description)
        .with_category(body.category)
        .with_unit_price(body.unit_price);
    if let Some(id) = body.id {
        let id: ProductId = match id.parse() {
            Ok(v) => v,
            Err(e) => return errors::ledger_error_to_response(e),
        };
        new_product = new_product.with_id(id);
    }

    match services.registry.create_product(new_product).await {
        Ok(product) => (
            StatusCode::CREATED,
            Json(json!({
                "success": true,
                "product_id": product.id.as_str(),
                "message": "Product created",
                "product": dto::product_to_json(&product),
            })),
        )
            .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.registry.list_products().await {
        Ok(products) => Json(json!({
            "success": true,
            "products": products.iter().map(dto::product_to_json).collect::<Vec<_>>(),
        }))
        .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id: ProductId = match id.parse() {
        Ok(v) => v,
        Err(e) => return errors::ledger_error_to_response(e),
    };
    match services.registry.product(&product_id).await {
        Ok(product) => Json(json!({
            "success": true,
            "product": dto::product_to_json(&product),
        }))
        .into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
