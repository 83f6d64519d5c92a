//! Domain layer for the order fulfillment system.
//!
//! This crate provides:
//! - `InventoryLedger`, the authoritative stock counts with exactly-once
//!   removals keyed by request fingerprint
//! - The idempotency history behind those removals and its retention sweep
//! - `CustomerOrder` and `RestockPipelineState`, the persistent records of
//!   the two workflows, each with pure transition methods
//! - The `RestockIntake` seam through which the ledger places restocks

pub mod error;
pub mod inventory;
pub mod money;
pub mod order;
pub mod restock;

pub use error::DomainError;
pub use inventory::{
    Fingerprint, IdempotencyRecord, INVENTORY_ITEMS, InventoryError, InventoryItem,
    InventoryItemView, InventoryLedger, RestockSweep,
};
pub use money::Money;
pub use order::{CustomerOrder, CustomerOrderItem, OrderError, OrderStatus};
pub use restock::{
    RestockError, RestockIntake, RestockPipelineState, RestockRequest, RestockStatus, RestockStep,
};
