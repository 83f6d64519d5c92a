//! Customer order record and its transitions.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use common::{InventoryItemId, OrderId};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderStatus};
use crate::inventory::Fingerprint;

/// One line of a customer order.
///
/// `fulfillment_remaining` starts at `quantity` and only ever decreases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerOrderItem {
    pub item_id: InventoryItemId,
    pub quantity: u32,
    fulfillment_remaining: u32,
}

impl CustomerOrderItem {
    pub fn new(item_id: InventoryItemId, quantity: u32) -> Self {
        Self {
            item_id,
            quantity,
            fulfillment_remaining: quantity,
        }
    }

    pub fn fulfillment_remaining(&self) -> u32 {
        self.fulfillment_remaining
    }

    pub fn is_fulfilled(&self) -> bool {
        self.fulfillment_remaining == 0
    }
}

/// The state of one order's fulfillment workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerOrder {
    id: OrderId,
    items: Vec<CustomerOrderItem>,
    status: OrderStatus,
    request_sequence: u64,
    submitted_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl CustomerOrder {
    /// An order nobody has submitted a cart for yet.
    pub fn new(id: OrderId) -> Self {
        Self {
            id,
            items: Vec::new(),
            status: OrderStatus::New,
            request_sequence: 0,
            submitted_at: None,
            updated_at: None,
        }
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[CustomerOrderItem] {
        &self.items
    }

    pub fn request_sequence(&self) -> u64 {
        self.request_sequence
    }

    pub fn submitted_at(&self) -> Option<DateTime<Utc>> {
        self.submitted_at
    }

    /// Fingerprint for removals issued by the current wake-up.
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(self.id, self.request_sequence)
    }

    /// Stores the cart and moves to `Submitted`.
    pub fn submit(
        &mut self,
        items: Vec<CustomerOrderItem>,
        now: DateTime<Utc>,
    ) -> Result<(), OrderError> {
        if !self.status.can_submit() {
            return Err(self.invalid("submit"));
        }
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        if let Some(item) = items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                item_id: item.item_id,
                quantity: item.quantity,
            });
        }
        // Removals of one wake-up are keyed per item, so each item gets one line.
        let mut seen = HashSet::with_capacity(items.len());
        if let Some(item) = items.iter().find(|item| !seen.insert(item.item_id)) {
            return Err(OrderError::DuplicateItem(item.item_id));
        }

        self.items = items;
        self.status = OrderStatus::Submitted;
        self.submitted_at = Some(now);
        self.updated_at = Some(now);
        Ok(())
    }

    /// Enters `InProcess` for a new wake-up.
    pub fn begin_fulfillment(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.can_begin_fulfillment() {
            return Err(self.invalid("begin fulfillment"));
        }
        self.status = OrderStatus::InProcess;
        self.updated_at = Some(now);
        Ok(())
    }

    /// Line items still waiting for stock, with their positions.
    pub fn pending_items(&self) -> Vec<(usize, CustomerOrderItem)> {
        self.items
            .iter()
            .enumerate()
            .filter(|(_, item)| !item.is_fulfilled())
            .map(|(index, item)| (index, item.clone()))
            .collect()
    }

    /// Applies the quantity the ledger actually removed for line `index`.
    pub fn record_removal(&mut self, index: usize, removed: u32) {
        if let Some(item) = self.items.get_mut(index) {
            item.fulfillment_remaining = item.fulfillment_remaining.saturating_sub(removed);
        }
    }

    /// Cancels the order because one of its items is unknown to inventory.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), OrderError> {
        if self.status != OrderStatus::InProcess {
            return Err(self.invalid("cancel"));
        }
        self.status = OrderStatus::Canceled;
        self.updated_at = Some(now);
        Ok(())
    }

    /// Ends the wake-up: `Shipped` if every line is fulfilled, otherwise
    /// `Backordered`. Advances the request sequence so the next wake-up uses
    /// a fresh fingerprint.
    pub fn complete_wakeup(&mut self, now: DateTime<Utc>) -> Result<OrderStatus, OrderError> {
        if self.status != OrderStatus::InProcess {
            return Err(self.invalid("complete wake-up"));
        }
        self.status = if self.items.iter().all(CustomerOrderItem::is_fulfilled) {
            OrderStatus::Shipped
        } else {
            OrderStatus::Backordered
        };
        self.request_sequence += 1;
        self.updated_at = Some(now);
        Ok(self.status)
    }

    fn invalid(&self, action: &'static str) -> OrderError {
        OrderError::InvalidStateTransition {
            current_state: self.status,
            action,
        }
    }
}
