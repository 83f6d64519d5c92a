//! Restock pipelines, one per item.
//!
//! A pipeline accepts a request, spends one wake-up in `Accepted` and one in
//! `Manufacturing`, then announces completion to every registered
//! [`RestockCompletionHandler`] and retires its reminder.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use common::InventoryItemId;
use domain::{
    DomainError, RestockError, RestockIntake, RestockPipelineState, RestockRequest, RestockStatus,
    RestockStep,
};
use state_store::{StateStore, StateStoreExt, StoreError, Transaction};

use crate::config::WorkflowConfig;
use crate::error::Result;
use crate::scheduler::{self, Reminder, WorkflowKind};

pub const RESTOCK_PIPELINES: &str = "restock_pipelines";

/// Name of the periodic reminder that advances a pipeline.
pub const MANUFACTURING_REMINDER: &str = "manufacturing";

/// Receives completed restocks.
#[async_trait]
pub trait RestockCompletionHandler: Send + Sync {
    /// Called once per completed pipeline, before the completion commits. A
    /// crash in between repeats the call.
    async fn on_restock_completed(&self, request: &RestockRequest) -> Result<()>;
}

/// Registry of restock pipelines keyed by item id.
pub struct RestockPipelines<S: StateStore> {
    store: S,
    handlers: Vec<Arc<dyn RestockCompletionHandler>>,
    first_wakeup: Duration,
    wakeup_period: Duration,
    transaction_timeout: Duration,
}

impl<S: StateStore> RestockPipelines<S> {
    pub fn new(store: S, config: &WorkflowConfig) -> Self {
        Self {
            store,
            handlers: Vec::new(),
            first_wakeup: config.restock_first_wakeup,
            wakeup_period: config.restock_wakeup_period,
            transaction_timeout: config.transaction_timeout,
        }
    }

    /// Registers a handler for completion notifications.
    pub fn register_handler(&mut self, handler: Arc<dyn RestockCompletionHandler>) {
        self.handlers.push(handler);
    }

    fn begin(&self) -> Transaction<'_> {
        self.store.begin_with_timeout(self.transaction_timeout)
    }

    /// Starts a pipeline for `request`.
    ///
    /// Fails with `AlreadyInProgress` if the item has a pipeline in
    /// `Accepted` or `Manufacturing`, including one accepted concurrently.
    #[tracing::instrument(skip(self, request), fields(item_id = %request.item_id, quantity = request.quantity))]
    pub async fn accept(&self, request: RestockRequest) -> std::result::Result<(), DomainError> {
        let now = Utc::now();
        let item_id = request.item_id;
        let key = item_id.to_string();
        let mut tx = self.begin();

        let existing: Option<RestockPipelineState> = tx.get(RESTOCK_PIPELINES, &key).await?;
        let state = match RestockPipelineState::accept(existing.as_ref(), request, now) {
            Ok(state) => state,
            Err(e) => {
                metrics::counter!("restock_requests_rejected_total").increment(1);
                return Err(e.into());
            }
        };

        tx.set(RESTOCK_PIPELINES, &key, &state)?;
        scheduler::register(
            &mut tx,
            &Reminder::new(
                WorkflowKind::RestockPipeline,
                &key,
                MANUFACTURING_REMINDER,
                self.first_wakeup,
                self.wakeup_period,
                now,
            ),
        )?;
        tx.commit().await.map_err(|e| match e {
            StoreError::ConcurrencyConflict { .. } => {
                metrics::counter!("restock_requests_rejected_total").increment(1);
                RestockError::AlreadyInProgress { item_id }.into()
            }
            other => DomainError::from(other),
        })?;

        metrics::counter!("restock_requests_accepted_total").increment(1);
        tracing::info!("restock accepted");
        Ok(())
    }

    /// Advances the pipeline of `item_id` by one stage.
    #[tracing::instrument(skip(self), fields(%item_id))]
    pub async fn on_wakeup(&self, item_id: InventoryItemId) -> Result<RestockStatus> {
        let key = item_id.to_string();
        let mut tx = self.begin();
        let Some(mut state) = tx.get::<RestockPipelineState>(RESTOCK_PIPELINES, &key).await? else {
            return Err(DomainError::from(RestockError::NotFound(item_id)).into());
        };

        let step = match state.advance(Utc::now()) {
            Ok(step) => step,
            Err(e) => {
                metrics::counter!("restock_unexpected_wakeups_total").increment(1);
                tracing::error!(status = %state.status(), "inconsistent state: wake-up for finished restock");
                return Err(DomainError::from(e).into());
            }
        };

        if step == RestockStep::Completed {
            for handler in &self.handlers {
                handler.on_restock_completed(state.request()).await?;
            }
            scheduler::unregister(
                &mut tx,
                WorkflowKind::RestockPipeline,
                &key,
                MANUFACTURING_REMINDER,
            );
        }

        tx.set(RESTOCK_PIPELINES, &key, &state)?;
        tx.commit().await?;

        if step == RestockStep::Completed {
            metrics::counter!("restock_completed_total").increment(1);
            tracing::info!(quantity = state.request().quantity, "restock completed");
        } else {
            tracing::debug!(status = %state.status(), "restock advanced");
        }
        Ok(state.status())
    }

    /// Loads the pipeline record of an item.
    pub async fn get_pipeline(
        &self,
        item_id: InventoryItemId,
    ) -> Result<Option<RestockPipelineState>> {
        let mut tx = self.begin();
        Ok(tx.get(RESTOCK_PIPELINES, &item_id.to_string()).await?)
    }

    /// Returns the stage of an item's pipeline, if it ever had one.
    pub async fn status(&self, item_id: InventoryItemId) -> Result<Option<RestockStatus>> {
        Ok(self
            .get_pipeline(item_id)
            .await?
            .map(|pipeline| pipeline.status()))
    }
}

#[async_trait]
impl<S: StateStore> RestockIntake for RestockPipelines<S> {
    async fn add_restock_request(
        &self,
        request: RestockRequest,
    ) -> std::result::Result<(), DomainError> {
        self.accept(request).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use state_store::InMemoryStateStore;

    use super::*;
    use crate::error::WorkflowError;

    #[derive(Default)]
    struct CollectingHandler {
        completed: Mutex<Vec<RestockRequest>>,
        fail: Mutex<bool>,
    }

    #[async_trait]
    impl RestockCompletionHandler for CollectingHandler {
        async fn on_restock_completed(&self, request: &RestockRequest) -> Result<()> {
            if *self.fail.lock().unwrap() {
                return Err(WorkflowError::InventoryService("queue unavailable".to_string()));
            }
            self.completed.lock().unwrap().push(request.clone());
            Ok(())
        }
    }

    fn pipelines() -> (
        RestockPipelines<InMemoryStateStore>,
        Arc<CollectingHandler>,
        InMemoryStateStore,
    ) {
        let store = InMemoryStateStore::new();
        let handler = Arc::new(CollectingHandler::default());
        let mut pipelines = RestockPipelines::new(store.clone(), &WorkflowConfig::default());
        pipelines.register_handler(handler.clone());
        (pipelines, handler, store)
    }

    #[tokio::test]
    async fn test_two_wakeups_complete_and_notify_once() {
        let (pipelines, handler, store) = pipelines();
        let item_id = InventoryItemId::new();
        pipelines
            .accept(RestockRequest::new(item_id, 10))
            .await
            .unwrap();
        assert_eq!(store.entry_count(scheduler::REMINDERS).await, 1);

        assert_eq!(
            pipelines.on_wakeup(item_id).await.unwrap(),
            RestockStatus::Manufacturing
        );
        assert!(handler.completed.lock().unwrap().is_empty());

        assert_eq!(
            pipelines.on_wakeup(item_id).await.unwrap(),
            RestockStatus::Completed
        );
        assert_eq!(
            *handler.completed.lock().unwrap(),
            vec![RestockRequest::new(item_id, 10)]
        );
        assert_eq!(store.entry_count(scheduler::REMINDERS).await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_accept_rejected_while_manufacturing() {
        let (pipelines, _, _) = pipelines();
        let item_id = InventoryItemId::new();
        pipelines
            .accept(RestockRequest::new(item_id, 10))
            .await
            .unwrap();
        pipelines.on_wakeup(item_id).await.unwrap();

        let err = pipelines
            .accept(RestockRequest::new(item_id, 3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Restock(RestockError::AlreadyInProgress { .. })
        ));

        let pipeline = pipelines.get_pipeline(item_id).await.unwrap().unwrap();
        assert_eq!(pipeline.request().quantity, 10);
    }

    #[tokio::test]
    async fn test_completed_pipeline_accepts_new_request() {
        let (pipelines, _, _) = pipelines();
        let item_id = InventoryItemId::new();
        pipelines
            .accept(RestockRequest::new(item_id, 10))
            .await
            .unwrap();
        pipelines.on_wakeup(item_id).await.unwrap();
        pipelines.on_wakeup(item_id).await.unwrap();

        pipelines
            .accept(RestockRequest::new(item_id, 4))
            .await
            .unwrap();
        assert_eq!(
            pipelines.status(item_id).await.unwrap(),
            Some(RestockStatus::Accepted)
        );
    }

    #[tokio::test]
    async fn test_failed_notification_keeps_pipeline_manufacturing() {
        let (pipelines, handler, store) = pipelines();
        let item_id = InventoryItemId::new();
        pipelines
            .accept(RestockRequest::new(item_id, 10))
            .await
            .unwrap();
        pipelines.on_wakeup(item_id).await.unwrap();

        *handler.fail.lock().unwrap() = true;
        assert!(pipelines.on_wakeup(item_id).await.unwrap_err().is_transient());
        assert_eq!(
            pipelines.status(item_id).await.unwrap(),
            Some(RestockStatus::Manufacturing)
        );
        assert_eq!(store.entry_count(scheduler::REMINDERS).await, 1);

        *handler.fail.lock().unwrap() = false;
        assert_eq!(
            pipelines.on_wakeup(item_id).await.unwrap(),
            RestockStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_wakeup_after_completion_is_invariant_violation() {
        let (pipelines, _, _) = pipelines();
        let item_id = InventoryItemId::new();
        pipelines
            .accept(RestockRequest::new(item_id, 1))
            .await
            .unwrap();
        pipelines.on_wakeup(item_id).await.unwrap();
        pipelines.on_wakeup(item_id).await.unwrap();

        let err = pipelines.on_wakeup(item_id).await.unwrap_err();
        assert!(matches!(
            err,
            WorkflowError::Domain(DomainError::Restock(RestockError::UnexpectedWakeup { .. }))
        ));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_intake_rejects_zero_quantity() {
        let (pipelines, _, _) = pipelines();
        let intake: &dyn RestockIntake = &pipelines;
        let err = intake
            .add_restock_request(RestockRequest::new(InventoryItemId::new(), 0))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Restock(RestockError::InvalidQuantity { .. })
        ));
    }
}
