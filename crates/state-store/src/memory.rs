use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::store::{ChangeSet, StateStore};
use crate::{Result, StoreError, Version, VersionedValue};

#[derive(Default)]
struct MemoryState {
    collections: HashMap<String, BTreeMap<String, VersionedValue>>,
    last_version: Version,
    commits: u64,
    unavailable: bool,
    latency: Option<Duration>,
}

impl MemoryState {
    fn current_version(&self, collection: &str, key: &str) -> Option<Version> {
        self.collections
            .get(collection)
            .and_then(|entries| entries.get(key))
            .map(|v| v.version)
    }
}

/// In-memory state store for tests and single-process deployments.
///
/// Provides the same transactional semantics as the PostgreSQL
/// implementation. Commits are serialized behind a single write lock.
#[derive(Clone, Default)]
pub struct InMemoryStateStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStateStore {
    /// Creates a new empty in-memory state store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries stored in a collection.
    pub async fn entry_count(&self, collection: &str) -> usize {
        self.state
            .read()
            .await
            .collections
            .get(collection)
            .map_or(0, BTreeMap::len)
    }

    /// Returns how many non-empty commits have been applied.
    pub async fn commit_count(&self) -> u64 {
        self.state.read().await.commits
    }

    /// Makes every subsequent operation fail with `Unavailable` until reset.
    pub async fn set_unavailable(&self, unavailable: bool) {
        self.state.write().await.unavailable = unavailable;
    }

    /// Delays every subsequent operation, to exercise transaction timeouts.
    pub async fn set_latency(&self, latency: Duration) {
        self.state.write().await.latency = Some(latency);
    }

    /// Clears all collections.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.collections.clear();
        state.commits = 0;
    }

    async fn admit(&self) -> Result<()> {
        let (unavailable, latency) = {
            let state = self.state.read().await;
            (state.unavailable, state.latency)
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if unavailable {
            return Err(StoreError::Unavailable(
                "in-memory store switched off".to_string(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn read(&self, collection: &str, key: &str) -> Result<Option<VersionedValue>> {
        self.admit().await?;
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn scan(&self, collection: &str) -> Result<Vec<(String, VersionedValue)>> {
        self.admit().await?;
        let state = self.state.read().await;
        Ok(state
            .collections
            .get(collection)
            .map(|entries| {
                entries
                    .iter()
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn commit(&self, changes: ChangeSet) -> Result<()> {
        self.admit().await?;
        let mut state = self.state.write().await;

        for check in &changes.checks {
            let actual = state.current_version(&check.entry.collection, &check.entry.key);
            if actual != check.expected {
                return Err(StoreError::conflict(
                    &check.entry.collection,
                    &check.entry.key,
                ));
            }
        }

        let version = state.last_version.next();
        state.last_version = version;
        state.commits += 1;

        for mutation in changes.writes {
            let entries = state
                .collections
                .entry(mutation.entry.collection)
                .or_default();
            match mutation.value {
                Some(value) => {
                    entries.insert(mutation.entry.key, VersionedValue { value, version });
                }
                None => {
                    entries.remove(&mutation.entry.key);
                }
            }
        }

        Ok(())
    }
}
