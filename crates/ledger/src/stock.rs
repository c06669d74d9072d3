use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{LedgerError, LedgerResult, ProductId, TransactionId};

/// Location recorded when a change request does not name one.
pub const DEFAULT_LOCATION: &str = "Warehouse-A";

/// Reason recorded when a change request does not give one.
pub const DEFAULT_REASON: &str = "Manual update";

/// Kind of ledger movement.
///
/// IN and OUT carry a magnitude; ADJUSTMENT carries an absolute target level.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    In,
    Out,
    Adjustment,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::In => "IN",
            Self::Out => "OUT",
            Self::Adjustment => "ADJUSTMENT",
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for TransactionKind {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "IN" => Ok(Self::In),
            "OUT" => Ok(Self::Out),
            "ADJUSTMENT" => Ok(Self::Adjustment),
            other => Err(LedgerError::invalid_argument(format!(
                "invalid transaction type: {other:?} (expected IN, OUT or ADJUSTMENT)"
            ))),
        }
    }
}

/// A requested stock movement, before it is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockChange {
    pub product_id: ProductId,
    pub kind: TransactionKind,
    pub quantity: i64,
    pub location: Option<String>,
    pub reason: Option<String>,
}

impl StockChange {
    pub fn new(product_id: ProductId, kind: TransactionKind, quantity: i64) -> Self {
        Self {
            product_id,
            kind,
            quantity,
            location: None,
            reason: None,
        }
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Location this change records, falling back to [`DEFAULT_LOCATION`].
    pub fn location_or_default(&self) -> &str {
        match self.location.as_deref() {
            Some(loc) if !loc.trim().is_empty() => loc,
            _ => DEFAULT_LOCATION,
        }
    }

    /// Reason this change records, falling back to [`DEFAULT_REASON`].
    pub fn reason_or_default(&self) -> &str {
        match self.reason.as_deref() {
            Some(reason) if !reason.trim().is_empty() => reason,
            _ => DEFAULT_REASON,
        }
    }

    /// Reject malformed requests before any store access.
    pub fn validate(&self) -> LedgerResult<()> {
        if self.quantity < 0 {
            return Err(LedgerError::invalid_argument(format!(
                "quantity must be non-negative, got {}",
                self.quantity
            )));
        }
        Ok(())
    }

    /// Compute the stock level this change produces from `previous`.
    ///
    /// Pure: no clock, no ids, no store. The engine runs this inside the
    /// per-product critical section so `previous` is the committed level.
    pub fn apply_to(&self, previous: i64) -> LedgerResult<StockTransition> {
        self.validate()?;

        let new = match self.kind {
            TransactionKind::In => previous.checked_add(self.quantity).ok_or_else(|| {
                LedgerError::failed_precondition(format!(
                    "stock level out of range: current {previous}, adding {}",
                    self.quantity
                ))
            })?,
            TransactionKind::Out => previous - self.quantity,
            TransactionKind::Adjustment => self.quantity,
        };

        if new < 0 {
            return Err(match self.kind {
                TransactionKind::Out => LedgerError::failed_precondition(format!(
                    "insufficient stock: current {previous}, requested {}",
                    self.quantity
                )),
                _ => LedgerError::failed_precondition(format!(
                    "invalid adjustment: target {new} is negative"
                )),
            });
        }

        Ok(StockTransition {
            previous_stock: previous,
            new_stock: new,
        })
    }
}

/// Outcome of applying a [`StockChange`] to a prior stock level.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct StockTransition {
    pub previous_stock: i64,
    pub new_stock: i64,
}

impl StockTransition {
    /// Net effect on the stock level.
    pub fn signed_delta(&self) -> i64 {
        self.new_stock - self.previous_stock
    }
}

/// A point-in-time recorded stock quantity for a product.
///
/// Snapshots are append-only; the current stock for a product is the snapshot
/// with the highest `version`. `version` is the token conditional appends
/// compare against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSnapshot {
    pub product_id: ProductId,
    pub quantity: i64,
    pub location: String,
    pub timestamp: DateTime<Utc>,
    pub version: u64,
}

/// A committed ledger movement.
///
/// `quantity_after` always equals the quantity in the snapshot committed
/// atomically with this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: TransactionId,
    pub product_id: ProductId,
    pub kind: TransactionKind,
    pub quantity: i64,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub location: String,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}
