use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{LedgerError, LedgerResult, ProductId};

/// A registered product.
///
/// Immutable once created; stock levels live in the ledger, not here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub unit_price: f64,
    pub created_at: DateTime<Utc>,
}

/// Input for product creation.
///
/// The identifier is optional; one is generated when absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProduct {
    pub id: Option<ProductId>,
    pub name: String,
    pub description: String,
    pub category: String,
    pub unit_price: f64,
}

impl NewProduct {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            description: String::new(),
            category: String::new(),
            unit_price: 0.0,
        }
    }

    pub fn with_id(mut self, id: ProductId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = category.into();
        self
    }

    pub fn with_unit_price(mut self, unit_price: f64) -> Self {
        self.unit_price = unit_price;
        self
    }

    pub fn validate(&self) -> LedgerResult<()> {
        if self.name.trim().is_empty() {
            return Err(LedgerError::invalid_argument("product name must not be empty"));
        }
        if !self.unit_price.is_finite() || self.unit_price < 0.0 {
            return Err(LedgerError::invalid_argument(format!(
                "unit price must be a non-negative number, got {}",
                self.unit_price
            )));
        }
        Ok(())
    }

    /// Validate and turn this input into a [`Product`], generating an
    /// identifier when the caller supplied none.
    pub fn build(self, now: DateTime<Utc>) -> LedgerResult<Product> {
        self.validate()?;
        Ok(Product {
            id: self.id.unwrap_or_else(ProductId::generate),
            name: self.name.trim().to_string(),
            description: self.description,
            category: self.category,
            unit_price: self.unit_price,
            created_at: now,
        })
    }
}
