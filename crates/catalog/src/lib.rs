//! Product catalog domain.
//!
//! Thin collaborator of the ledger: products exist so stock changes have
//! something to reference. No business rule beyond identifier uniqueness,
//! which the catalog store enforces.

pub mod product;

pub use product::{NewProduct, Product};
