//! The inventory ledger service.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use common::InventoryItemId;
use state_store::{DEFAULT_TRANSACTION_TIMEOUT, StateStore, StateStoreExt, StoreError, Transaction};

use super::idempotency::{self, Fingerprint, Lookup};
use super::{InventoryError, InventoryItem, InventoryItemView};
use crate::error::DomainError;
use crate::restock::{RestockError, RestockIntake, RestockRequest};

pub const INVENTORY_ITEMS: &str = "inventory_items";

/// Outcome of one stock-threshold sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestockSweep {
    /// Requests accepted by the restock intake.
    pub requested: Vec<RestockRequest>,
    /// Items whose restock was already in flight; only the flag was set.
    pub already_in_progress: usize,
    /// Items that changed between the scan and the flag update.
    pub lost_races: usize,
    /// Items whose restock request failed and will be retried next sweep.
    pub failed: usize,
}

/// Authoritative stock counts with exactly-once removals.
///
/// Every operation runs in its own store transaction. Removals are
/// deduplicated by fingerprint, so a caller may redeliver a removal any
/// number of times and observe the same result.
#[derive(Clone)]
pub struct InventoryLedger<S: StateStore> {
    store: S,
    transaction_timeout: Duration,
}

impl<S: StateStore> InventoryLedger<S> {
    /// Creates a ledger with the default transaction timeout.
    pub fn new(store: S) -> Self {
        Self {
            store,
            transaction_timeout: DEFAULT_TRANSACTION_TIMEOUT,
        }
    }

    /// Overrides the timeout applied to each ledger transaction.
    pub fn with_transaction_timeout(mut self, timeout: Duration) -> Self {
        self.transaction_timeout = timeout;
        self
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    fn begin(&self) -> Transaction<'_> {
        self.store.begin_with_timeout(self.transaction_timeout)
    }

    /// Inserts a new item; fails with `AlreadyExists` if the id is taken.
    #[tracing::instrument(skip(self, item), fields(item_id = %item.id))]
    pub async fn create_item(&self, item: InventoryItem) -> Result<(), DomainError> {
        let key = item.id.to_string();
        let mut tx = self.begin();
        if tx.contains(INVENTORY_ITEMS, &key).await? {
            return Err(InventoryError::AlreadyExists(item.id).into());
        }
        tx.set(INVENTORY_ITEMS, &key, &item)?;
        tx.commit().await.map_err(|e| match e {
            StoreError::ConcurrencyConflict { .. } => InventoryError::AlreadyExists(item.id).into(),
            other => DomainError::from(other),
        })?;

        metrics::counter!("inventory_items_created_total").increment(1);
        tracing::info!(
            description = %item.description,
            available = item.available_stock(),
            "inventory item created"
        );
        Ok(())
    }

    /// Loads the full record of an item.
    pub async fn get_item(
        &self,
        item_id: InventoryItemId,
    ) -> Result<Option<InventoryItem>, DomainError> {
        let mut tx = self.begin();
        Ok(tx.get(INVENTORY_ITEMS, &item_id.to_string()).await?)
    }

    /// Returns true if the ledger has ever heard of this item.
    pub async fn is_item_known(&self, item_id: InventoryItemId) -> Result<bool, DomainError> {
        let mut tx = self.begin();
        Ok(tx.contains(INVENTORY_ITEMS, &item_id.to_string()).await?)
    }

    /// Adds stock, clamped at the max threshold, and clears the on-reorder
    /// flag. Returns the units actually added; an unknown item adds nothing.
    #[tracing::instrument(skip(self), fields(%item_id))]
    pub async fn add_stock(
        &self,
        item_id: InventoryItemId,
        quantity: u32,
    ) -> Result<u32, DomainError> {
        let key = item_id.to_string();
        let mut tx = self.begin();
        let Some(mut item) = tx.get::<InventoryItem>(INVENTORY_ITEMS, &key).await? else {
            tracing::warn!(quantity, "stock added to unknown item was dropped");
            return Ok(0);
        };

        let added = item.add_stock(quantity);
        tx.set(INVENTORY_ITEMS, &key, &item)?;
        tx.commit().await?;

        metrics::counter!("inventory_stock_added_total").increment(u64::from(added));
        tracing::info!(
            requested = quantity,
            added,
            available = item.available_stock(),
            "stock added"
        );
        Ok(added)
    }

    /// Removes up to `quantity` units exactly once per fingerprint.
    ///
    /// The first delivery of `fingerprint` for this item removes
    /// `min(quantity, available)` and records the result in the same
    /// transaction. Every later delivery returns the recorded result without
    /// touching stock.
    #[tracing::instrument(skip(self), fields(%item_id, %fingerprint))]
    pub async fn remove_stock(
        &self,
        item_id: InventoryItemId,
        quantity: u32,
        fingerprint: Fingerprint,
    ) -> Result<u32, DomainError> {
        let now = Utc::now();
        let mut tx = self.begin();

        if let Lookup::Recorded(record) = idempotency::lookup(&mut tx, fingerprint, item_id).await? {
            idempotency::touch(&mut tx, fingerprint, item_id, now)?;
            tx.commit().await?;
            metrics::counter!("inventory_duplicate_removals_total").increment(1);
            tracing::debug!(removed = record.removed, "duplicate removal suppressed");
            return Ok(record.removed);
        }

        let key = item_id.to_string();
        let Some(mut item) = tx.get::<InventoryItem>(INVENTORY_ITEMS, &key).await? else {
            tracing::warn!(quantity, "removal requested for unknown item");
            return Ok(0);
        };

        let removed = item.remove_stock(quantity);
        tx.set(INVENTORY_ITEMS, &key, &item)?;
        idempotency::record(&mut tx, fingerprint, item_id, removed, now)?;
        tx.commit().await?;

        metrics::counter!("inventory_stock_removed_total").increment(u64::from(removed));
        tracing::info!(
            requested = quantity,
            removed,
            available = item.available_stock(),
            "stock removed"
        );
        Ok(removed)
    }

    /// Lists items with positive customer-available stock.
    pub async fn customer_inventory(&self) -> Result<Vec<InventoryItemView>, DomainError> {
        let mut tx = self.begin();
        let items: Vec<(String, InventoryItem)> = tx.enumerate(INVENTORY_ITEMS).await?;
        Ok(items
            .into_iter()
            .map(|(_, item)| item.view())
            .filter(|view| view.customer_available_stock > 0)
            .collect())
    }

    /// Deletes an item. Fails with `ItemNotFound` if it does not exist.
    #[tracing::instrument(skip(self), fields(%item_id))]
    pub async fn delete_item(&self, item_id: InventoryItemId) -> Result<(), DomainError> {
        let key = item_id.to_string();
        let mut tx = self.begin();
        if !tx.contains(INVENTORY_ITEMS, &key).await? {
            return Err(InventoryError::ItemNotFound(item_id).into());
        }
        tx.remove(INVENTORY_ITEMS, &key);
        tx.commit().await?;
        tracing::info!("inventory item deleted");
        Ok(())
    }

    /// Places a restock for every item at or below its threshold that is not
    /// already on reorder.
    ///
    /// The request is sized from the scanned state. The on-reorder flag is
    /// then set with a compare-and-swap against that same state; if the item
    /// changed in between, the flag write is abandoned and the next sweep
    /// looks at the item again. A request for an item whose restock is
    /// already in flight only sets the flag.
    #[tracing::instrument(skip(self, intake))]
    pub async fn check_restock_thresholds(
        &self,
        intake: &dyn RestockIntake,
    ) -> Result<RestockSweep, DomainError> {
        let scanned: Vec<(String, InventoryItem)> = {
            let mut tx = self.begin();
            tx.enumerate(INVENTORY_ITEMS).await?
        };

        let mut sweep = RestockSweep::default();
        for (_, item) in scanned.into_iter().filter(|(_, item)| item.needs_restock()) {
            let request = RestockRequest::new(item.id, item.restock_quantity());

            match intake.add_restock_request(request.clone()).await {
                Ok(()) => {
                    metrics::counter!("inventory_restocks_requested_total").increment(1);
                    tracing::info!(item_id = %item.id, quantity = request.quantity, "restock requested");
                    sweep.requested.push(request);
                }
                Err(DomainError::Restock(RestockError::AlreadyInProgress { .. })) => {
                    sweep.already_in_progress += 1;
                }
                Err(e) => {
                    tracing::warn!(item_id = %item.id, error = %e, "restock request failed");
                    sweep.failed += 1;
                    continue;
                }
            }

            if !self.try_mark_on_reorder(&item).await? {
                tracing::debug!(item_id = %item.id, "item changed during sweep, flag not set");
                sweep.lost_races += 1;
            }
        }

        Ok(sweep)
    }

    /// Sets the on-reorder flag if the stored item still equals `expected`.
    async fn try_mark_on_reorder(&self, expected: &InventoryItem) -> Result<bool, DomainError> {
        let key = expected.id.to_string();
        let mut tx = self.begin();
        let current: Option<InventoryItem> = tx.get(INVENTORY_ITEMS, &key).await?;
        if current.as_ref() != Some(expected) {
            return Ok(false);
        }

        let mut marked = expected.clone();
        marked.mark_on_reorder();
        tx.set(INVENTORY_ITEMS, &key, &marked)?;
        match tx.commit().await {
            Ok(()) => Ok(true),
            Err(StoreError::ConcurrencyConflict { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Drops removal history last seen more than `retention` before `now`.
    ///
    /// Each fingerprint is trimmed in its own transaction, so a redelivery
    /// touching one marker only costs that marker, which the next sweep
    /// picks up again.
    #[tracing::instrument(skip(self))]
    pub async fn trim_request_history(
        &self,
        retention: Duration,
        now: DateTime<Utc>,
    ) -> Result<usize, DomainError> {
        let retention = TimeDelta::from_std(retention).unwrap_or(TimeDelta::MAX);
        let cutoff = now.checked_sub_signed(retention).unwrap_or(DateTime::<Utc>::MIN_UTC);

        let mut tx = self.begin();
        let keys = idempotency::expired(&mut tx, cutoff).await?;
        tx.abort();

        let mut trimmed = 0;
        for key in keys {
            let mut tx = self.begin();
            if !idempotency::trim_key(&mut tx, &key, cutoff).await? {
                tx.abort();
                continue;
            }
            match tx.commit().await {
                Ok(()) => trimmed += 1,
                Err(StoreError::ConcurrencyConflict { .. }) => {
                    tracing::debug!(%key, "request history refreshed during trim, keeping it");
                }
                Err(e) => return Err(e.into()),
            }
        }

        if trimmed > 0 {
            metrics::counter!("inventory_request_history_trimmed_total").increment(trimmed as u64);
            tracing::info!(trimmed, "old request history trimmed");
        }
        Ok(trimmed)
    }
}
