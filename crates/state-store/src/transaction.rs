use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::store::{ChangeSet, Mutation, ReadCheck, StateStore};
use crate::{EntryKey, Result, StoreError, VersionedValue};

/// An optimistic transaction over a [`StateStore`].
///
/// Reads are served from the store once and then cached, writes are buffered
/// and visible to later reads of the same transaction. `commit` re-validates
/// the version of everything that was read, so a read-then-conditional-write
/// inside one transaction is a compare-and-swap. Dropping the transaction
/// without committing aborts it.
pub struct Transaction<'a> {
    store: &'a dyn StateStore,
    timeout: Duration,
    reads: HashMap<EntryKey, Option<VersionedValue>>,
    writes: BTreeMap<EntryKey, Option<serde_json::Value>>,
}

impl<'a> Transaction<'a> {
    /// Creates a transaction against `store`.
    pub fn new(store: &'a dyn StateStore, timeout: Duration) -> Self {
        Self {
            store,
            timeout,
            reads: HashMap::new(),
            writes: BTreeMap::new(),
        }
    }

    /// Reads and deserializes an entry, seeing this transaction's own writes.
    pub async fn get<T: DeserializeOwned>(
        &mut self,
        collection: &str,
        key: &str,
    ) -> Result<Option<T>> {
        let entry = EntryKey::new(collection, key);
        let value = match self.writes.get(&entry) {
            Some(pending) => pending.clone(),
            None => self.observe(&entry).await?,
        };
        value
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)
    }

    /// Returns true if the entry exists from this transaction's point of view.
    pub async fn contains(&mut self, collection: &str, key: &str) -> Result<bool> {
        let entry = EntryKey::new(collection, key);
        match self.writes.get(&entry) {
            Some(pending) => Ok(pending.is_some()),
            None => Ok(self.observe(&entry).await?.is_some()),
        }
    }

    /// Buffers a write of `value` under `key`.
    pub fn set<T: Serialize>(&mut self, collection: &str, key: &str, value: &T) -> Result<()> {
        let value = serde_json::to_value(value)?;
        self.writes
            .insert(EntryKey::new(collection, key), Some(value));
        Ok(())
    }

    /// Buffers removal of `key`. Removing an absent key is a no-op at commit.
    pub fn remove(&mut self, collection: &str, key: &str) {
        self.writes.insert(EntryKey::new(collection, key), None);
    }

    /// Lists every entry of a collection, ordered by key, with this
    /// transaction's buffered writes applied on top.
    ///
    /// Every listed entry joins the read set. Entries created by others after
    /// the scan are not detected at commit.
    pub async fn enumerate<T: DeserializeOwned>(
        &mut self,
        collection: &str,
    ) -> Result<Vec<(String, T)>> {
        let scanned = bounded(self.timeout, self.store.scan(collection)).await?;

        let mut view: BTreeMap<String, serde_json::Value> = BTreeMap::new();
        for (key, current) in scanned {
            let entry = EntryKey::new(collection, key.as_str());
            let seen = self
                .reads
                .entry(entry)
                .or_insert_with(|| Some(current.clone()));
            if let Some(seen) = seen {
                view.insert(key, seen.value.clone());
            }
        }

        for (entry, pending) in self.writes.iter() {
            if entry.collection != collection {
                continue;
            }
            match pending {
                Some(value) => view.insert(entry.key.clone(), value.clone()),
                None => view.remove(&entry.key),
            };
        }

        view.into_iter()
            .map(|(key, value)| Ok((key, serde_json::from_value(value)?)))
            .collect()
    }

    /// Returns true if nothing has been written yet.
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }

    /// Commits all buffered writes atomically.
    ///
    /// Fails with `ConcurrencyConflict` if anything this transaction read was
    /// changed by another committer, or with `Timeout` if the backend does not
    /// answer in time. A read-only transaction commits trivially.
    pub async fn commit(self) -> Result<()> {
        if self.writes.is_empty() {
            return Ok(());
        }

        let mut checks: Vec<ReadCheck> = self
            .reads
            .into_iter()
            .map(|(entry, seen)| ReadCheck {
                entry,
                expected: seen.map(|v| v.version),
            })
            .collect();
        checks.sort_by(|a, b| a.entry.cmp(&b.entry));

        let writes = self
            .writes
            .into_iter()
            .map(|(entry, value)| Mutation { entry, value })
            .collect();

        let result = bounded(self.timeout, self.store.commit(ChangeSet { checks, writes })).await;
        if let Err(StoreError::ConcurrencyConflict { collection, key }) = &result {
            metrics::counter!("state_store_conflicts_total").increment(1);
            tracing::debug!(%collection, %key, "transaction lost a write race");
        }
        result
    }

    /// Discards all buffered writes.
    pub fn abort(self) {}

    async fn observe(&mut self, entry: &EntryKey) -> Result<Option<serde_json::Value>> {
        if let Some(seen) = self.reads.get(entry) {
            return Ok(seen.as_ref().map(|v| v.value.clone()));
        }
        let current = bounded(
            self.timeout,
            self.store.read(&entry.collection, &entry.key),
        )
        .await?;
        let value = current.as_ref().map(|v| v.value.clone());
        self.reads.insert(entry.clone(), current);
        Ok(value)
    }
}

async fn bounded<T>(timeout: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            metrics::counter!("state_store_timeouts_total").increment(1);
            Err(StoreError::Timeout(timeout))
        }
    }
}
