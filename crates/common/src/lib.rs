//! Identifiers shared by every crate in the fulfillment system.

mod types;

pub use types::{InventoryItemId, OrderId};
