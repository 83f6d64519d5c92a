use std::time::Duration;

use thiserror::Error;

/// Errors that can occur when interacting with the state store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// An entry read by the transaction changed before it committed.
    /// The first committer wins; the loser must re-read and retry.
    #[error("Concurrency conflict on {collection}/{key}")]
    ConcurrencyConflict { collection: String, key: String },

    /// The transaction did not complete within its timeout.
    #[error("Transaction timed out after {0:?}")]
    Timeout(Duration),

    /// The backend is temporarily unable to serve requests.
    #[error("State store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Returns true if retrying the whole operation later may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StoreError::ConcurrencyConflict { .. }
                | StoreError::Timeout(_)
                | StoreError::Unavailable(_)
                | StoreError::Database(_)
        )
    }

    pub(crate) fn conflict(collection: &str, key: &str) -> Self {
        StoreError::ConcurrencyConflict {
            collection: collection.to_string(),
            key: key.to_string(),
        }
    }
}

/// Result type for state store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
