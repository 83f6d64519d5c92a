//! Collaborators the workflows call out to.

pub mod inventory;

pub use inventory::{InMemoryInventoryService, InventoryService};
