//! Wires the workflows together and drives every periodic task.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use common::{InventoryItemId, OrderId};
use domain::{InventoryLedger, RestockSweep};
use futures_util::future::join_all;
use state_store::StateStore;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::WorkflowConfig;
use crate::dispatcher::CompletionDispatcher;
use crate::error::{Result, WorkflowError};
use crate::order_fulfillment::OrderFulfillment;
use crate::restock_pipeline::RestockPipelines;
use crate::scheduler::{Reminder, WakeupScheduler, WorkflowKind};

/// What one scheduler tick did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub fired: usize,
    pub failed: usize,
}

/// The ledger, both workflows and the dispatcher over one store.
pub struct WorkflowRuntime<S: StateStore + Clone + 'static> {
    config: WorkflowConfig,
    ledger: InventoryLedger<S>,
    orders: OrderFulfillment<S, InventoryLedger<S>>,
    pipelines: RestockPipelines<S>,
    dispatcher: Arc<CompletionDispatcher<S, InventoryLedger<S>>>,
    scheduler: WakeupScheduler<S>,
}

impl<S: StateStore + Clone + 'static> WorkflowRuntime<S> {
    /// Builds every component and subscribes the dispatcher to restock
    /// completions.
    pub fn new(store: S, config: WorkflowConfig) -> Self {
        let ledger = InventoryLedger::new(store.clone())
            .with_transaction_timeout(config.transaction_timeout);
        let dispatcher = Arc::new(CompletionDispatcher::new(
            store.clone(),
            ledger.clone(),
            &config,
        ));
        let mut pipelines = RestockPipelines::new(store.clone(), &config);
        pipelines.register_handler(dispatcher.clone());

        Self {
            orders: OrderFulfillment::new(store.clone(), ledger.clone(), &config),
            scheduler: WakeupScheduler::new(store, config.transaction_timeout),
            ledger,
            pipelines,
            dispatcher,
            config,
        }
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    pub fn orders(&self) -> &OrderFulfillment<S, InventoryLedger<S>> {
        &self.orders
    }

    pub fn pipelines(&self) -> &RestockPipelines<S> {
        &self.pipelines
    }

    pub fn dispatcher(&self) -> &CompletionDispatcher<S, InventoryLedger<S>> {
        &self.dispatcher
    }

    pub fn scheduler(&self) -> &WakeupScheduler<S> {
        &self.scheduler
    }

    /// Fires every reminder due at `now` and reschedules the survivors.
    ///
    /// Due reminders belong to distinct instances, so they run concurrently
    /// without two wake-ups of one instance ever overlapping.
    pub async fn tick(&self, now: DateTime<Utc>) -> Result<TickReport> {
        let started = Instant::now();
        let due = self.scheduler.due(now).await?;
        if due.is_empty() {
            return Ok(TickReport::default());
        }

        let outcomes = join_all(due.iter().map(|reminder| self.dispatch(reminder))).await;

        let mut report = TickReport::default();
        for (reminder, outcome) in due.iter().zip(outcomes) {
            report.fired += 1;
            if let Err(e) = outcome {
                report.failed += 1;
                metrics::counter!("workflow_wakeup_failures_total").increment(1);
                if e.is_transient() {
                    tracing::warn!(reminder = %reminder.key(), error = %e, "wake-up failed, will retry");
                } else {
                    tracing::error!(reminder = %reminder.key(), error = %e, "wake-up failed");
                }
            }

            if let Err(e) = self.scheduler.reschedule(reminder, now).await {
                tracing::warn!(reminder = %reminder.key(), error = %e, "failed to reschedule reminder");
            }
        }

        metrics::counter!("workflow_wakeups_total").increment(report.fired as u64);
        metrics::histogram!("workflow_tick_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        Ok(report)
    }

    async fn dispatch(&self, reminder: &Reminder) -> Result<()> {
        let unknown = || WorkflowError::UnknownReminder(reminder.key());
        match reminder.kind {
            WorkflowKind::OrderFulfillment => {
                let order_id: OrderId = reminder.instance.parse().map_err(|_| unknown())?;
                self.orders.on_wakeup(order_id).await?;
            }
            WorkflowKind::RestockPipeline => {
                let item_id: InventoryItemId = reminder.instance.parse().map_err(|_| unknown())?;
                self.pipelines.on_wakeup(item_id).await?;
            }
        }
        Ok(())
    }

    /// Runs one stock-threshold sweep against the restock pipelines.
    pub async fn sweep_thresholds(&self) -> Result<RestockSweep> {
        Ok(self.ledger.check_restock_thresholds(&self.pipelines).await?)
    }

    /// Drops removal history older than the configured retention.
    pub async fn trim_history(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self
            .ledger
            .trim_request_history(self.config.history_retention, now)
            .await?)
    }

    /// Spawns the scheduler, dispatcher and both sweeps. Every task exits
    /// once `shutdown` flips to true.
    pub fn run(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let dispatcher = Arc::clone(&self.dispatcher);
        let dispatcher_shutdown = shutdown.clone();

        vec![
            spawn_periodic(
                "scheduler",
                self.config.scheduler_poll_interval,
                shutdown.clone(),
                {
                    let runtime = Arc::clone(&self);
                    move || {
                        let runtime = Arc::clone(&runtime);
                        async move {
                            if let Err(e) = runtime.tick(Utc::now()).await {
                                tracing::warn!(error = %e, "scheduler tick failed");
                            }
                        }
                    }
                },
            ),
            spawn_periodic(
                "threshold_sweep",
                self.config.threshold_sweep_interval,
                shutdown.clone(),
                {
                    let runtime = Arc::clone(&self);
                    move || {
                        let runtime = Arc::clone(&runtime);
                        async move {
                            if let Err(e) = runtime.sweep_thresholds().await {
                                tracing::warn!(error = %e, "threshold sweep failed");
                            }
                        }
                    }
                },
            ),
            spawn_periodic(
                "history_sweep",
                self.config.history_sweep_interval,
                shutdown,
                {
                    let runtime = Arc::clone(&self);
                    move || {
                        let runtime = Arc::clone(&runtime);
                        async move {
                            if let Err(e) = runtime.trim_history(Utc::now()).await {
                                tracing::warn!(error = %e, "history sweep failed");
                            }
                        }
                    }
                },
            ),
            tokio::spawn(async move { dispatcher.run(dispatcher_shutdown).await }),
        ]
    }
}

/// Runs `task` every `interval` until `shutdown` flips to true.
fn spawn_periodic<F, Fut>(
    name: &'static str,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut task: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        tracing::info!(task = name, interval_ms = interval.as_millis() as u64, "background task started");
        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                Ok(_) = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                    continue;
                }
            }

            task().await;
        }
        tracing::info!(task = name, "background task stopped");
    })
}

#[cfg(test)]
mod tests {
    use common::InventoryItemId;
    use domain::{CustomerOrderItem, InventoryItem, Money, OrderStatus, RestockStatus};
    use state_store::InMemoryStateStore;

    use super::*;

    fn immediate() -> WorkflowConfig {
        WorkflowConfig {
            order_wakeup_period: Duration::ZERO,
            restock_first_wakeup: Duration::ZERO,
            restock_wakeup_period: Duration::ZERO,
            ..WorkflowConfig::default()
        }
    }

    #[tokio::test]
    async fn test_tick_without_reminders_is_empty() {
        let runtime = WorkflowRuntime::new(InMemoryStateStore::new(), immediate());
        assert_eq!(runtime.tick(Utc::now()).await.unwrap(), TickReport::default());
    }

    #[tokio::test]
    async fn test_tick_drives_order_and_restock() {
        let runtime = WorkflowRuntime::new(InMemoryStateStore::new(), immediate());
        let item = InventoryItem::new(
            InventoryItemId::new(),
            "Gadget",
            Money::from_cents(999),
            2,
            1,
            5,
        )
        .unwrap();
        runtime.ledger().create_item(item.clone()).await.unwrap();

        let order_id = OrderId::new();
        runtime
            .orders()
            .submit_order(order_id, vec![CustomerOrderItem::new(item.id, 2)])
            .await
            .unwrap();

        let report = runtime.tick(Utc::now()).await.unwrap();
        assert_eq!(report, TickReport { fired: 1, failed: 0 });
        assert_eq!(
            runtime.orders().get_status(order_id).await.unwrap(),
            OrderStatus::Shipped
        );

        let sweep = runtime.sweep_thresholds().await.unwrap();
        assert_eq!(sweep.requested.len(), 1);

        runtime.tick(Utc::now()).await.unwrap();
        runtime.tick(Utc::now()).await.unwrap();
        assert_eq!(
            runtime.pipelines().status(item.id).await.unwrap(),
            Some(RestockStatus::Completed)
        );
        assert_eq!(runtime.dispatcher().pending().await.unwrap(), 1);

        runtime.dispatcher().drain_all().await.unwrap();
        let stored = runtime.ledger().get_item(item.id).await.unwrap().unwrap();
        assert_eq!(stored.available_stock(), 5);
        assert!(!stored.is_on_reorder());
    }

    #[tokio::test]
    async fn test_canceled_order_drops_reminder() {
        let runtime = WorkflowRuntime::new(InMemoryStateStore::new(), immediate());
        let order_id = OrderId::new();
        runtime
            .orders()
            .submit_order(order_id, vec![CustomerOrderItem::new(InventoryItemId::new(), 1)])
            .await
            .unwrap();

        let report = runtime.tick(Utc::now()).await.unwrap();
        assert_eq!(report, TickReport { fired: 1, failed: 0 });
        assert_eq!(
            runtime.orders().get_status(order_id).await.unwrap(),
            OrderStatus::Canceled
        );
        assert!(runtime.scheduler().registered().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_wakeup_is_rescheduled() {
        let store = InMemoryStateStore::new();
        let runtime = WorkflowRuntime::new(store.clone(), immediate());
        let now = Utc::now();
        let bogus = Reminder::new(
            WorkflowKind::OrderFulfillment,
            "not-an-order-id",
            "fulfillment",
            Duration::ZERO,
            Duration::from_secs(10),
            now,
        );
        let mut tx = state_store::StateStoreExt::begin(&store);
        crate::scheduler::register(&mut tx, &bogus).unwrap();
        tx.commit().await.unwrap();

        let report = runtime.tick(now).await.unwrap();
        assert_eq!(report, TickReport { fired: 1, failed: 1 });

        let registered = runtime.scheduler().registered().await.unwrap();
        assert_eq!(registered.len(), 1);
        assert!(registered[0].next_fire_at > now);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let runtime = Arc::new(WorkflowRuntime::new(InMemoryStateStore::new(), immediate()));
        let (tx, rx) = watch::channel(false);
        let handles = runtime.run(rx);
        assert_eq!(handles.len(), 4);

        tx.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
