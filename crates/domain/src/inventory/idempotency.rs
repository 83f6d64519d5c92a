//! Duplicate suppression for stock removals.
//!
//! Each removal is keyed by the caller's fingerprint plus the item id. Two
//! collections back it: a "seen" marker holding the last delivery time, and a
//! write-once result record. Both are written in the same transaction as the
//! stock change, so a seen marker without a result means the store lost a
//! write.

use std::time::Duration;

use chrono::{DateTime, Utc};
use common::{InventoryItemId, OrderId};
use serde::{Deserialize, Serialize};
use state_store::Transaction;

use super::InventoryError;
use crate::error::DomainError;

pub const REQUESTS_SEEN: &str = "idempotency_seen";
pub const REQUEST_RESULTS: &str = "idempotency_results";

/// How long request history is kept. Redeliveries older than this are not
/// expected from the transport.
pub const DEFAULT_RETENTION: Duration = Duration::from_secs(2 * 60 * 60);

/// Identity of one logical removal attempt: the order and the request
/// sequence number of the wake-up that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingerprint {
    pub order_id: OrderId,
    pub sequence: u64,
}

impl Fingerprint {
    pub fn new(order_id: OrderId, sequence: u64) -> Self {
        Self { order_id, sequence }
    }

    /// Key of the removal of `item_id` within this fingerprint's family.
    pub fn key_for(&self, item_id: InventoryItemId) -> String {
        format!("{}:{}:{}", self.order_id, self.sequence, item_id)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.order_id, self.sequence)
    }
}

/// Result of the first processing of a fingerprint. Never rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyRecord {
    pub item_id: InventoryItemId,
    pub removed: u32,
    pub recorded_at: DateTime<Utc>,
}

/// Outcome of looking up a fingerprint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    Unseen,
    Recorded(IdempotencyRecord),
}

/// Looks up a previous result inside `tx`.
///
/// A seen marker without a result is reported as
/// `InventoryError::InconsistentRequestHistory`, which callers treat as a
/// transient fault.
pub async fn lookup(
    tx: &mut Transaction<'_>,
    fingerprint: Fingerprint,
    item_id: InventoryItemId,
) -> Result<Lookup, DomainError> {
    let key = fingerprint.key_for(item_id);
    if !tx.contains(REQUESTS_SEEN, &key).await? {
        return Ok(Lookup::Unseen);
    }

    match tx.get::<IdempotencyRecord>(REQUEST_RESULTS, &key).await? {
        Some(record) => Ok(Lookup::Recorded(record)),
        None => {
            metrics::counter!("inventory_inconsistent_state_total").increment(1);
            tracing::error!(
                %fingerprint,
                %item_id,
                "inconsistent state: request marked seen but no result recorded"
            );
            Err(InventoryError::InconsistentRequestHistory {
                fingerprint: key,
            }
            .into())
        }
    }
}

/// Records the first result for a fingerprint and marks it seen.
///
/// Must follow an `Unseen` lookup in the same transaction; the commit then
/// fails if anyone else recorded the fingerprint in between.
pub fn record(
    tx: &mut Transaction<'_>,
    fingerprint: Fingerprint,
    item_id: InventoryItemId,
    removed: u32,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    let key = fingerprint.key_for(item_id);
    tx.set(
        REQUEST_RESULTS,
        &key,
        &IdempotencyRecord {
            item_id,
            removed,
            recorded_at: now,
        },
    )?;
    tx.set(REQUESTS_SEEN, &key, &now)?;
    Ok(())
}

/// Refreshes the seen marker of a redelivered fingerprint.
pub fn touch(
    tx: &mut Transaction<'_>,
    fingerprint: Fingerprint,
    item_id: InventoryItemId,
    now: DateTime<Utc>,
) -> Result<(), DomainError> {
    tx.set(REQUESTS_SEEN, &fingerprint.key_for(item_id), &now)?;
    Ok(())
}

/// Lists fingerprint keys whose last delivery is older than `cutoff`.
pub async fn expired(
    tx: &mut Transaction<'_>,
    cutoff: DateTime<Utc>,
) -> Result<Vec<String>, DomainError> {
    let seen: Vec<(String, DateTime<Utc>)> = tx.enumerate(REQUESTS_SEEN).await?;
    Ok(seen
        .into_iter()
        .filter(|(_, last_seen)| *last_seen < cutoff)
        .map(|(key, _)| key)
        .collect())
}

/// Drops the history of one fingerprint if it is still older than
/// `cutoff`. Returns false when a redelivery refreshed it in the meantime.
pub async fn trim_key(
    tx: &mut Transaction<'_>,
    key: &str,
    cutoff: DateTime<Utc>,
) -> Result<bool, DomainError> {
    match tx.get::<DateTime<Utc>>(REQUESTS_SEEN, key).await? {
        Some(last_seen) if last_seen < cutoff => {
            tx.remove(REQUESTS_SEEN, key);
            tx.remove(REQUEST_RESULTS, key);
            Ok(true)
        }
        _ => Ok(false),
    }
}
