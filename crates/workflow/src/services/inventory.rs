//! Inventory service trait, its ledger implementation and an in-memory mock.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::InventoryItemId;
use domain::{Fingerprint, InventoryLedger};
use state_store::StateStore;
use tokio::sync::RwLock;

use crate::error::WorkflowError;

/// The inventory operations the order workflow and the dispatcher depend on.
#[async_trait]
pub trait InventoryService: Send + Sync {
    /// Returns true if the item exists at all.
    async fn is_item_known(&self, item_id: InventoryItemId) -> Result<bool, WorkflowError>;

    /// Removes up to `quantity` units exactly once per fingerprint and item.
    async fn remove_stock(
        &self,
        item_id: InventoryItemId,
        quantity: u32,
        fingerprint: Fingerprint,
    ) -> Result<u32, WorkflowError>;

    /// Adds up to `quantity` units and returns the units actually added.
    async fn add_stock(&self, item_id: InventoryItemId, quantity: u32)
    -> Result<u32, WorkflowError>;
}

#[async_trait]
impl<S: StateStore> InventoryService for InventoryLedger<S> {
    async fn is_item_known(&self, item_id: InventoryItemId) -> Result<bool, WorkflowError> {
        Ok(InventoryLedger::is_item_known(self, item_id).await?)
    }

    async fn remove_stock(
        &self,
        item_id: InventoryItemId,
        quantity: u32,
        fingerprint: Fingerprint,
    ) -> Result<u32, WorkflowError> {
        Ok(InventoryLedger::remove_stock(self, item_id, quantity, fingerprint).await?)
    }

    async fn add_stock(
        &self,
        item_id: InventoryItemId,
        quantity: u32,
    ) -> Result<u32, WorkflowError> {
        Ok(InventoryLedger::add_stock(self, item_id, quantity).await?)
    }
}

#[derive(Debug, Default)]
struct InMemoryInventoryState {
    stock: HashMap<InventoryItemId, u32>,
    removals: HashMap<String, u32>,
    supply_per_call: Option<u32>,
    fail: bool,
    remove_calls: usize,
}

/// In-memory inventory service for testing.
///
/// Removals are deduplicated by fingerprint like the real ledger. Each call
/// can be capped with [`set_supply_per_call`](Self::set_supply_per_call) to
/// simulate a trickle of stock.
#[derive(Debug, Clone, Default)]
pub struct InMemoryInventoryService {
    state: Arc<RwLock<InMemoryInventoryState>>,
}

impl InMemoryInventoryService {
    /// Creates a new in-memory inventory service with no items.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an item with the given stock.
    pub async fn add_item(&self, item_id: InventoryItemId, stock: u32) {
        self.state.write().await.stock.insert(item_id, stock);
    }

    /// Caps how many units a single removal call may supply.
    pub async fn set_supply_per_call(&self, limit: Option<u32>) {
        self.state.write().await.supply_per_call = limit;
    }

    /// Configures every call to fail until reset.
    pub async fn set_fail(&self, fail: bool) {
        self.state.write().await.fail = fail;
    }

    /// Returns the current stock of an item.
    pub async fn stock_of(&self, item_id: InventoryItemId) -> Option<u32> {
        self.state.read().await.stock.get(&item_id).copied()
    }

    /// Returns how many removal calls were made, duplicates included.
    pub async fn remove_calls(&self) -> usize {
        self.state.read().await.remove_calls
    }

    fn unavailable() -> WorkflowError {
        WorkflowError::InventoryService("inventory unavailable".to_string())
    }
}

#[async_trait]
impl InventoryService for InMemoryInventoryService {
    async fn is_item_known(&self, item_id: InventoryItemId) -> Result<bool, WorkflowError> {
        let state = self.state.read().await;
        if state.fail {
            return Err(Self::unavailable());
        }
        Ok(state.stock.contains_key(&item_id))
    }

    async fn remove_stock(
        &self,
        item_id: InventoryItemId,
        quantity: u32,
        fingerprint: Fingerprint,
    ) -> Result<u32, WorkflowError> {
        let mut state = self.state.write().await;
        state.remove_calls += 1;
        if state.fail {
            return Err(Self::unavailable());
        }

        let key = fingerprint.key_for(item_id);
        if let Some(removed) = state.removals.get(&key) {
            return Ok(*removed);
        }

        let cap = state.supply_per_call.unwrap_or(u32::MAX);
        let Some(available) = state.stock.get_mut(&item_id) else {
            return Ok(0);
        };
        let removed = quantity.min(*available).min(cap);
        *available -= removed;
        state.removals.insert(key, removed);
        Ok(removed)
    }

    async fn add_stock(
        &self,
        item_id: InventoryItemId,
        quantity: u32,
    ) -> Result<u32, WorkflowError> {
        let mut state = self.state.write().await;
        if state.fail {
            return Err(Self::unavailable());
        }
        match state.stock.get_mut(&item_id) {
            Some(available) => {
                *available += quantity;
                Ok(quantity)
            }
            None => Ok(0),
        }
    }
}
