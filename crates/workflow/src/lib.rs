//! Workflows of the order fulfillment system.
//!
//! This crate provides:
//! - A persisted wake-up scheduler standing in for per-instance reminders
//! - The order fulfillment workflow, woken until an order ships or cancels
//! - Restock pipelines that simulate manufacturing lead time
//! - The completion dispatcher that feeds finished restocks back into stock
//! - `WorkflowRuntime`, which wires them together over one state store and
//!   runs every periodic task until shutdown

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod order_fulfillment;
pub mod restock_pipeline;
pub mod runtime;
pub mod scheduler;
pub mod services;

pub use config::WorkflowConfig;
pub use dispatcher::{CompletionDispatcher, Delivery};
pub use error::{Result, WorkflowError};
pub use order_fulfillment::OrderFulfillment;
pub use restock_pipeline::{RestockCompletionHandler, RestockPipelines};
pub use runtime::{TickReport, WorkflowRuntime};
pub use scheduler::{Reminder, WakeupScheduler, WorkflowKind};
pub use services::{InMemoryInventoryService, InventoryService};
