//! Workflow error types.

use domain::DomainError;
use state_store::StoreError;
use thiserror::Error;

/// Errors that can occur while driving workflows.
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Domain error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// State store error.
    #[error("State store error: {0}")]
    Store(#[from] StoreError),

    /// Inventory service error.
    #[error("Inventory service error: {0}")]
    InventoryService(String),

    /// A persisted reminder names no known workflow instance.
    #[error("Unknown reminder: {0}")]
    UnknownReminder(String),
}

impl WorkflowError {
    /// Returns true if the next scheduled wake-up may succeed where this one
    /// failed.
    pub fn is_transient(&self) -> bool {
        match self {
            WorkflowError::Domain(e) => e.is_transient(),
            WorkflowError::Store(e) => e.is_transient(),
            WorkflowError::InventoryService(_) => true,
            WorkflowError::UnknownReminder(_) => false,
        }
    }
}

/// Convenience type alias for workflow results.
pub type Result<T> = std::result::Result<T, WorkflowError>;
