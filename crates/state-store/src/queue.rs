//! Durable FIFO queue layered on the transactional store.

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::{Result, Transaction};

/// Collection holding the head and tail cursors of every queue.
pub const QUEUE_CURSORS: &str = "queue_cursors";

/// A named, durable FIFO queue.
///
/// Entries are stored under zero-padded sequence numbers. The producer side
/// only touches the tail cursor and the consumer side only the head cursor,
/// so an enqueue and a dequeue of different entries never conflict.
/// Every operation joins the caller's transaction: an entry is only gone
/// once the transaction that dequeued it commits.
#[derive(Debug, Clone)]
pub struct DurableQueue {
    name: String,
    entries: String,
}

impl DurableQueue {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let entries = format!("queue:{name}");
        Self { name, entries }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Appends `item` and returns its sequence number.
    pub async fn enqueue<T: Serialize>(&self, tx: &mut Transaction<'_>, item: &T) -> Result<u64> {
        let tail_key = self.tail_key();
        let tail: u64 = tx.get(QUEUE_CURSORS, &tail_key).await?.unwrap_or(0);

        tx.set(&self.entries, &entry_key(tail), item)?;
        tx.set(QUEUE_CURSORS, &tail_key, &(tail + 1))?;
        Ok(tail)
    }

    /// Removes and returns the oldest entry, or `None` if the queue is empty.
    pub async fn try_dequeue<T: DeserializeOwned>(
        &self,
        tx: &mut Transaction<'_>,
    ) -> Result<Option<T>> {
        let head_key = self.head_key();
        let head: u64 = tx.get(QUEUE_CURSORS, &head_key).await?.unwrap_or(0);

        let key = entry_key(head);
        let Some(item) = tx.get::<T>(&self.entries, &key).await? else {
            return Ok(None);
        };

        tx.remove(&self.entries, &key);
        tx.set(QUEUE_CURSORS, &head_key, &(head + 1))?;
        Ok(Some(item))
    }

    /// Returns the number of entries not yet dequeued.
    pub async fn len(&self, tx: &mut Transaction<'_>) -> Result<u64> {
        let head: u64 = tx.get(QUEUE_CURSORS, &self.head_key()).await?.unwrap_or(0);
        let tail: u64 = tx.get(QUEUE_CURSORS, &self.tail_key()).await?.unwrap_or(0);
        Ok(tail.saturating_sub(head))
    }

    pub async fn is_empty(&self, tx: &mut Transaction<'_>) -> Result<bool> {
        Ok(self.len(tx).await? == 0)
    }

    fn head_key(&self) -> String {
        format!("{}:head", self.name)
    }

    fn tail_key(&self) -> String {
        format!("{}:tail", self.name)
    }
}

fn entry_key(sequence: u64) -> String {
    format!("{sequence:020}")
}
