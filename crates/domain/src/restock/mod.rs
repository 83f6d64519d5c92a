//! Restock requests and the pipeline record that fulfils them.

mod record;
mod state;

pub use record::{RestockPipelineState, RestockStep};
pub use state::RestockStatus;

use async_trait::async_trait;
use common::InventoryItemId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::DomainError;

/// A request to bring an item back up to its max stock threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestockRequest {
    pub item_id: InventoryItemId,
    pub quantity: u32,
}

impl RestockRequest {
    pub fn new(item_id: InventoryItemId, quantity: u32) -> Self {
        Self { item_id, quantity }
    }
}

/// Errors that can occur during restock operations.
#[derive(Debug, Error)]
pub enum RestockError {
    /// A restock for this item is already Accepted or Manufacturing.
    #[error("Restock already in progress for item {item_id}")]
    AlreadyInProgress { item_id: InventoryItemId },

    /// Restock quantities must be positive.
    #[error("Invalid restock quantity for item {item_id} (must be greater than 0)")]
    InvalidQuantity { item_id: InventoryItemId },

    /// A wake-up reached a pipeline in a state that cannot advance.
    #[error("Unexpected wake-up for restock of item {item_id} in {status} state")]
    UnexpectedWakeup {
        item_id: InventoryItemId,
        status: RestockStatus,
    },

    /// No pipeline exists for this item.
    #[error("No restock pipeline for item {0}")]
    NotFound(InventoryItemId),
}

/// Anything that accepts restock requests from the inventory ledger.
#[async_trait]
pub trait RestockIntake: Send + Sync {
    /// Starts a restock; fails with `RestockError::AlreadyInProgress` if one
    /// is outstanding for the same item.
    async fn add_restock_request(&self, request: RestockRequest) -> Result<(), DomainError>;
}
