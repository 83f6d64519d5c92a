//! Domain error types.

use state_store::StoreError;
use thiserror::Error;

use crate::inventory::InventoryError;
use crate::order::OrderError;
use crate::restock::RestockError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the state store.
    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    /// An error occurred in the inventory ledger.
    #[error("Inventory error: {0}")]
    Inventory(InventoryError),

    /// An error occurred in an order.
    #[error("Order error: {0}")]
    Order(OrderError),

    /// An error occurred in a restock pipeline.
    #[error("Restock error: {0}")]
    Restock(RestockError),
}

impl DomainError {
    /// Returns true for faults that the next scheduled wake-up may clear.
    ///
    /// Business outcomes (unknown item, restock already in progress) and
    /// invariant violations are not transient. A fingerprint seen without a
    /// recorded result is reported as transient.
    pub fn is_transient(&self) -> bool {
        match self {
            DomainError::Store(e) => e.is_transient(),
            DomainError::Inventory(InventoryError::InconsistentRequestHistory { .. }) => true,
            _ => false,
        }
    }
}

impl From<InventoryError> for DomainError {
    fn from(e: InventoryError) -> Self {
        DomainError::Inventory(e)
    }
}

impl From<OrderError> for DomainError {
    fn from(e: OrderError) -> Self {
        DomainError::Order(e)
    }
}

impl From<RestockError> for DomainError {
    fn from(e: RestockError) -> Self {
        DomainError::Restock(e)
    }
}
