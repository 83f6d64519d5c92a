//! Customer order record and its fulfillment state machine.

mod customer_order;
mod state;

pub use customer_order::{CustomerOrder, CustomerOrderItem};
pub use state::OrderStatus;

use common::{InventoryItemId, OrderId};
use thiserror::Error;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// Order is not in the expected state.
    #[error("Invalid state transition: cannot {action} from {current_state} state")]
    InvalidStateTransition {
        current_state: OrderStatus,
        action: &'static str,
    },

    /// Invalid quantity.
    #[error("Invalid quantity for item {item_id}: {quantity} (must be greater than 0)")]
    InvalidQuantity {
        item_id: InventoryItemId,
        quantity: u32,
    },

    /// The same item appears on more than one line.
    #[error("Item {0} appears on more than one order line")]
    DuplicateItem(InventoryItemId),

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// No order exists with this id.
    #[error("Order not found: {0}")]
    NotFound(OrderId),
}
