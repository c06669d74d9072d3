//! Strongly-typed identifiers used across the ledger.
//!
//! Identifiers are opaque strings on the wire. Generated forms carry a short
//! prefix plus uppercase hex so operators can tell products and transactions
//! apart at a glance, but any non-empty caller-supplied string is accepted.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LedgerError;

/// Identifier of a product.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

/// Identifier of a committed ledger transaction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(String);

macro_rules! impl_string_newtype {
    ($t:ty, $name:literal, $prefix:literal, $hex_len:literal) => {
        impl $t {
            /// Generate a fresh identifier.
            ///
            /// Takes the tail of a UUIDv7 (the random bits, not the
            /// timestamp prefix) so ids minted in the same instant differ.
            /// Prefer passing ids explicitly in tests for determinism.
            pub fn generate() -> Self {
                let hex = Uuid::now_v7().simple().to_string();
                let tail = &hex[hex.len() - $hex_len..];
                Self(format!("{}{}", $prefix, tail.to_uppercase()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl FromStr for $t {
            type Err = LedgerError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err(LedgerError::invalid_argument(concat!(
                        $name,
                        " must not be empty"
                    )));
                }
                Ok(Self(trimmed.to_string()))
            }
        }

        impl TryFrom<String> for $t {
            type Error = LedgerError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

impl_string_newtype!(ProductId, "product id", "PROD", 6);
impl_string_newtype!(TransactionId, "transaction id", "TXN", 8);
