//! Completion dispatcher.
//!
//! Completed restocks are parked in a durable queue and drained back into
//! the inventory one at a time. An entry leaves the queue only after its
//! stock was added, so a crash in between redelivers it; additions clamp at
//! the item's maximum, which makes a redelivery harmless.

use std::time::Duration;

use async_trait::async_trait;
use domain::RestockRequest;
use state_store::{DurableQueue, StateStore, StateStoreExt};
use tokio::sync::watch;

use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::restock_pipeline::RestockCompletionHandler;
use crate::services::InventoryService;

/// Name of the queue holding completed restocks.
pub const COMPLETED_RESTOCKS: &str = "completed_restocks";

/// Outcome of draining one queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub request: RestockRequest,
    pub added: u32,
}

/// Moves completed restocks from the queue into the inventory.
pub struct CompletionDispatcher<S: StateStore, I: InventoryService> {
    store: S,
    inventory: I,
    queue: DurableQueue,
    interval: Duration,
    dequeue_timeout: Duration,
    transaction_timeout: Duration,
}

impl<S: StateStore, I: InventoryService> CompletionDispatcher<S, I> {
    pub fn new(store: S, inventory: I, config: &WorkflowConfig) -> Self {
        Self {
            store,
            inventory,
            queue: DurableQueue::new(COMPLETED_RESTOCKS),
            interval: config.dispatcher_interval,
            dequeue_timeout: config.dispatcher_dequeue_timeout,
            transaction_timeout: config.transaction_timeout,
        }
    }

    /// Appends a completed restock to the queue.
    #[tracing::instrument(skip(self, request), fields(item_id = %request.item_id))]
    pub async fn enqueue(&self, request: &RestockRequest) -> Result<()> {
        let mut tx = self.store.begin_with_timeout(self.transaction_timeout);
        let sequence = self.queue.enqueue(&mut tx, request).await?;
        tx.commit().await?;

        metrics::counter!("dispatcher_enqueued_total").increment(1);
        tracing::debug!(sequence, quantity = request.quantity, "completed restock queued");
        Ok(())
    }

    /// Delivers the oldest queued restock, if any.
    ///
    /// The dequeue commits only after the inventory accepted the addition;
    /// on failure the entry stays at the head of the queue.
    pub async fn drain_once(&self) -> Result<Option<Delivery>> {
        let mut tx = self.store.begin_with_timeout(self.dequeue_timeout);
        let Some(request) = self.queue.try_dequeue::<RestockRequest>(&mut tx).await? else {
            tx.abort();
            return Ok(None);
        };

        let added = match self
            .inventory
            .add_stock(request.item_id, request.quantity)
            .await
        {
            Ok(added) => added,
            Err(e) => {
                tx.abort();
                return Err(e);
            }
        };
        tx.commit().await?;

        metrics::counter!("dispatcher_deliveries_total").increment(1);
        tracing::info!(
            item_id = %request.item_id,
            quantity = request.quantity,
            added,
            "restock delivered to inventory"
        );
        Ok(Some(Delivery { request, added }))
    }

    /// Drains until the queue is empty. Returns the deliveries made.
    pub async fn drain_all(&self) -> Result<Vec<Delivery>> {
        let mut deliveries = Vec::new();
        while let Some(delivery) = self.drain_once().await? {
            deliveries.push(delivery);
        }
        Ok(deliveries)
    }

    /// Returns the number of queued restocks.
    pub async fn pending(&self) -> Result<u64> {
        let mut tx = self.store.begin_with_timeout(self.transaction_timeout);
        Ok(self.queue.len(&mut tx).await?)
    }

    /// Drain loop: empties the queue, then sleeps for the configured
    /// interval. Exits when `shutdown` flips to true.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(interval_ms = self.interval.as_millis() as u64, "dispatcher started");
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            match self.drain_once().await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "dispatcher drain failed, will retry"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {}
                Ok(_) = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        tracing::info!("dispatcher stopped");
    }
}

#[async_trait]
impl<S: StateStore, I: InventoryService> RestockCompletionHandler for CompletionDispatcher<S, I> {
    async fn on_restock_completed(&self, request: &RestockRequest) -> Result<()> {
        self.enqueue(request).await
    }
}

#[cfg(test)]
mod tests {
    use common::InventoryItemId;
    use state_store::InMemoryStateStore;

    use super::*;
    use crate::services::InMemoryInventoryService;

    fn dispatcher(
        inventory: &InMemoryInventoryService,
    ) -> CompletionDispatcher<InMemoryStateStore, InMemoryInventoryService> {
        CompletionDispatcher::new(
            InMemoryStateStore::new(),
            inventory.clone(),
            &WorkflowConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_drain_delivers_in_order() {
        let inventory = InMemoryInventoryService::new();
        let a = InventoryItemId::new();
        let b = InventoryItemId::new();
        inventory.add_item(a, 0).await;
        inventory.add_item(b, 0).await;
        let dispatcher = dispatcher(&inventory);

        dispatcher
            .on_restock_completed(&RestockRequest::new(a, 5))
            .await
            .unwrap();
        dispatcher
            .on_restock_completed(&RestockRequest::new(b, 7))
            .await
            .unwrap();
        assert_eq!(dispatcher.pending().await.unwrap(), 2);

        let deliveries = dispatcher.drain_all().await.unwrap();
        assert_eq!(deliveries.len(), 2);
        assert_eq!(deliveries[0].request.item_id, a);
        assert_eq!(deliveries[1].request.item_id, b);
        assert_eq!(inventory.stock_of(a).await, Some(5));
        assert_eq!(inventory.stock_of(b).await, Some(7));
        assert_eq!(dispatcher.pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_failed_delivery_stays_queued() {
        let inventory = InMemoryInventoryService::new();
        let item_id = InventoryItemId::new();
        inventory.add_item(item_id, 0).await;
        let dispatcher = dispatcher(&inventory);
        dispatcher
            .enqueue(&RestockRequest::new(item_id, 3))
            .await
            .unwrap();

        inventory.set_fail(true).await;
        assert!(dispatcher.drain_once().await.is_err());
        assert_eq!(dispatcher.pending().await.unwrap(), 1);

        inventory.set_fail(false).await;
        let delivery = dispatcher.drain_once().await.unwrap().unwrap();
        assert_eq!(delivery.added, 3);
        assert_eq!(dispatcher.pending().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_empty_queue_drains_nothing() {
        let inventory = InMemoryInventoryService::new();
        let dispatcher = dispatcher(&inventory);
        assert_eq!(dispatcher.drain_once().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let inventory = InMemoryInventoryService::new();
        let item_id = InventoryItemId::new();
        inventory.add_item(item_id, 0).await;
        let dispatcher = std::sync::Arc::new(dispatcher(&inventory));
        dispatcher
            .enqueue(&RestockRequest::new(item_id, 2))
            .await
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let handle = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.run(rx).await }
        });

        while dispatcher.pending().await.unwrap() > 0 {
            tokio::task::yield_now().await;
        }
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(inventory.stock_of(item_id).await, Some(2));
    }
}
