//! Inventory ledger and the records it owns.

pub mod idempotency;
mod item;
mod ledger;

pub use idempotency::{Fingerprint, IdempotencyRecord};
pub use item::{InventoryItem, InventoryItemView};
pub use ledger::{INVENTORY_ITEMS, InventoryLedger, RestockSweep};

use common::InventoryItemId;
use thiserror::Error;

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum InventoryError {
    /// An item with this id already exists.
    #[error("Inventory item already exists: {0}")]
    AlreadyExists(InventoryItemId),

    /// No item with this id exists.
    #[error("Inventory item not found: {0}")]
    ItemNotFound(InventoryItemId),

    /// The item violates a stock invariant.
    #[error("Invalid inventory item: {0}")]
    InvalidItem(String),

    /// A removal fingerprint is marked seen but its result is missing.
    #[error("Inconsistent request history for fingerprint {fingerprint}")]
    InconsistentRequestHistory { fingerprint: String },
}
