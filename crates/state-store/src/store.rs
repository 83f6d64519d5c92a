use std::time::Duration;

use async_trait::async_trait;

use crate::{EntryKey, Result, Transaction, Version, VersionedValue};

/// Timeout applied to every store round trip of a transaction unless the
/// caller picks another one.
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(4);

/// A version observed by a transaction that must still hold at commit time.
///
/// `expected: None` means the entry was absent when read and must still be
/// absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadCheck {
    pub entry: EntryKey,
    pub expected: Option<Version>,
}

/// A buffered write. `value: None` removes the entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub entry: EntryKey,
    pub value: Option<serde_json::Value>,
}

/// Everything a transaction hands to the backend when it commits.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    /// Sorted by entry so backends lock rows in a stable order.
    pub checks: Vec<ReadCheck>,
    pub writes: Vec<Mutation>,
}

impl ChangeSet {
    /// Returns true if the transaction read the entry and found it absent.
    pub fn expects_absent(&self, entry: &EntryKey) -> bool {
        self.checks
            .iter()
            .any(|check| check.entry == *entry && check.expected.is_none())
    }
}

/// Core trait for state store backends.
///
/// Backends only need single reads, collection scans, and an atomic
/// validate-then-apply commit; read-your-writes and buffering live in
/// [`Transaction`]. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Reads the committed value of a single entry.
    async fn read(&self, collection: &str, key: &str) -> Result<Option<VersionedValue>>;

    /// Reads every committed entry of a collection, ordered by key.
    async fn scan(&self, collection: &str) -> Result<Vec<(String, VersionedValue)>>;

    /// Atomically validates `checks` and applies `writes`.
    ///
    /// Fails with `ConcurrencyConflict` and applies nothing if any checked
    /// entry no longer has the expected version.
    async fn commit(&self, changes: ChangeSet) -> Result<()>;
}

/// Extension trait for opening transactions on any store.
pub trait StateStoreExt: StateStore + Sized {
    /// Begins a transaction with the default timeout.
    fn begin(&self) -> Transaction<'_> {
        Transaction::new(self, DEFAULT_TRANSACTION_TIMEOUT)
    }

    /// Begins a transaction whose store round trips are bounded by `timeout`.
    fn begin_with_timeout(&self, timeout: Duration) -> Transaction<'_> {
        Transaction::new(self, timeout)
    }
}

impl<T: StateStore> StateStoreExt for T {}
