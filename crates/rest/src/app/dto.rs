//! Request/response DTOs and JSON mapping helpers.

use serde::Deserialize;
use serde_json::{Value, json};

use stockledger_catalog::Product;
use stockledger_core::{LedgerResult, ProductId};
use stockledger_engine::{CurrentStock, StockChangeReceipt};
use stockledger_ledger::{StockChange, StockSnapshot, StockTransaction, TransactionKind};

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub unit_price: f64,
}

#[derive(Debug, Deserialize)]
pub struct StockUpdateRequest {
    pub product_id: String,
    #[serde(rename = "type")]
    pub transaction_type: String,
    pub quantity: i64,
    pub location: Option<String>,
    pub reason: Option<String>,
}

impl StockUpdateRequest {
    pub fn into_change(self) -> LedgerResult<StockChange> {
        let product_id: ProductId = self.product_id.parse()?;
        let kind: TransactionKind = self.transaction_type.parse()?;
        let mut change = StockChange::new(product_id, kind, self.quantity);
        if let Some(location) = self.location {
            change = change.with_location(location);
        }
        if let Some(reason) = self.reason {
            change = change.with_reason(reason);
        }
        Ok(change)
    }
}

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

pub fn product_to_json(product: &Product) -> Value {
    json!({
        "id": product.id.as_str(),
        "name": product.name,
        "description": product.description,
        "category": product.category,
        "unit_price": product.unit_price,
        "created_at": product.created_at.to_rfc3339(),
    })
}

pub fn snapshot_to_json(snapshot: &StockSnapshot) -> Value {
    json!({
        "product_id": snapshot.product_id.as_str(),
        "quantity": snapshot.quantity,
        "location": snapshot.location,
        "last_updated": snapshot.timestamp.to_rfc3339(),
        "version": snapshot.version,
    })
}

/// Stock for one product. `recorded` tells callers whether any movement has
/// ever been committed; unmoved products read as quantity zero.
pub fn stock_to_json(product_id: &ProductId, current: &CurrentStock) -> Value {
    match &current.snapshot {
        Some(snapshot) => {
            let mut body = snapshot_to_json(snapshot);
            body["recorded"] = Value::Bool(true);
            body
        }
        None => json!({
            "product_id": product_id.as_str(),
            "quantity": 0,
            "recorded": false,
        }),
    }
}

pub fn transaction_to_json(transaction: &StockTransaction) -> Value {
    json!({
        "id": transaction.id.as_str(),
        "product_id": transaction.product_id.as_str(),
        "type": transaction.kind.as_str(),
        "quantity": transaction.quantity,
        "previous_stock": transaction.quantity_before,
        "new_stock": transaction.quantity_after,
        "location": transaction.location,
        "reason": transaction.reason,
        "timestamp": transaction.timestamp.to_rfc3339(),
    })
}

/// Body for a committed stock update. `change` echoes the requested quantity,
/// which for an adjustment is the counted total rather than a delta.
pub fn receipt_to_json(receipt: &StockChangeReceipt, change: i64) -> Value {
    json!({
        "success": true,
        "transaction_id": receipt.transaction_id.as_str(),
        "previous_stock": receipt.previous_stock,
        "new_stock": receipt.new_stock,
        "change": change,
    })
}
