//! Inventory item record and its customer-facing view.

use common::InventoryItemId;
use serde::{Deserialize, Serialize};

use super::InventoryError;
use crate::money::Money;

/// A stocked item as held by the inventory ledger.
///
/// `0 <= available_stock <= max_stock_threshold` holds for every value of
/// this type: construction validates it and the only stock mutations clamp
/// instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub description: String,
    pub unit_price: Money,
    available_stock: u32,
    restock_threshold: u32,
    max_stock_threshold: u32,
    on_reorder: bool,
}

impl InventoryItem {
    /// Creates a validated item that is not on reorder.
    pub fn new(
        id: InventoryItemId,
        description: impl Into<String>,
        unit_price: Money,
        available_stock: u32,
        restock_threshold: u32,
        max_stock_threshold: u32,
    ) -> Result<Self, InventoryError> {
        let description = description.into();
        if description.trim().is_empty() {
            return Err(InventoryError::InvalidItem(
                "description must not be empty".to_string(),
            ));
        }
        if unit_price.is_negative() {
            return Err(InventoryError::InvalidItem(format!(
                "unit price {unit_price} must not be negative"
            )));
        }
        if max_stock_threshold == 0 {
            return Err(InventoryError::InvalidItem(
                "max stock threshold must be greater than 0".to_string(),
            ));
        }
        if restock_threshold >= max_stock_threshold {
            return Err(InventoryError::InvalidItem(format!(
                "restock threshold {restock_threshold} must be below max stock threshold {max_stock_threshold}"
            )));
        }
        if available_stock > max_stock_threshold {
            return Err(InventoryError::InvalidItem(format!(
                "available stock {available_stock} exceeds max stock threshold {max_stock_threshold}"
            )));
        }

        Ok(Self {
            id,
            description,
            unit_price,
            available_stock,
            restock_threshold,
            max_stock_threshold,
            on_reorder: false,
        })
    }

    pub fn available_stock(&self) -> u32 {
        self.available_stock
    }

    pub fn restock_threshold(&self) -> u32 {
        self.restock_threshold
    }

    pub fn max_stock_threshold(&self) -> u32 {
        self.max_stock_threshold
    }

    pub fn is_on_reorder(&self) -> bool {
        self.on_reorder
    }

    /// Adds up to `quantity` units, clamped at the max stock threshold, and
    /// clears the on-reorder flag. Returns the units actually added.
    pub fn add_stock(&mut self, quantity: u32) -> u32 {
        let added = quantity.min(self.max_stock_threshold - self.available_stock);
        self.available_stock += added;
        self.on_reorder = false;
        added
    }

    /// Removes up to `quantity` units, never going below zero. Returns the
    /// units actually removed.
    pub fn remove_stock(&mut self, quantity: u32) -> u32 {
        let removed = quantity.min(self.available_stock);
        self.available_stock -= removed;
        removed
    }

    /// True if stock is at or below the restock threshold and no restock has
    /// been placed yet.
    pub fn needs_restock(&self) -> bool {
        self.available_stock <= self.restock_threshold && !self.on_reorder
    }

    /// Units needed to fill the item back up to its max stock threshold.
    pub fn restock_quantity(&self) -> u32 {
        self.max_stock_threshold - self.available_stock
    }

    pub fn mark_on_reorder(&mut self) {
        self.on_reorder = true;
    }

    /// Stock shown to customers: raw stock minus the restock threshold,
    /// which is held back as a safety buffer.
    pub fn customer_available_stock(&self) -> u32 {
        self.available_stock.saturating_sub(self.restock_threshold)
    }

    pub fn view(&self) -> InventoryItemView {
        InventoryItemView {
            id: self.id,
            description: self.description.clone(),
            unit_price: self.unit_price,
            customer_available_stock: self.customer_available_stock(),
        }
    }
}

/// What the storefront is allowed to see of an item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryItemView {
    pub id: InventoryItemId,
    pub description: String,
    pub unit_price: Money,
    pub customer_available_stock: u32,
}
