//! Transactional keyed state store.
//!
//! Provides the storage primitive the fulfillment services are built on:
//! - `StateStore` backends (in-memory and PostgreSQL) with atomic,
//!   version-checked commits
//! - `Transaction` with read-your-writes, enumeration and compare-and-swap
//!   semantics, bounded by a per-transaction timeout
//! - `DurableQueue`, an at-least-once FIFO stored alongside the data it
//!   coordinates

pub mod error;
pub mod memory;
pub mod postgres;
pub mod queue;
pub mod record;
pub mod store;
pub mod transaction;

pub use error::{Result, StoreError};
pub use memory::InMemoryStateStore;
pub use postgres::PostgresStateStore;
pub use queue::DurableQueue;
pub use record::{EntryKey, Version, VersionedValue};
pub use store::{
    ChangeSet, DEFAULT_TRANSACTION_TIMEOUT, Mutation, ReadCheck, StateStore, StateStoreExt,
};
pub use transaction::Transaction;
