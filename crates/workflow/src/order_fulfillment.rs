//! Order fulfillment workflow.
//!
//! One persisted [`CustomerOrder`] per order id, woken periodically until it
//! ships or is canceled. Each wake-up removes what stock it can for every
//! unfulfilled line and backorders the rest. Removals carry the order's
//! current fingerprint, so a wake-up that fails partway is replayed safely.

use std::time::{Duration, Instant};

use chrono::Utc;
use common::OrderId;
use domain::{CustomerOrder, CustomerOrderItem, OrderError, OrderStatus};
use state_store::{StateStore, StateStoreExt, Transaction};

use crate::config::WorkflowConfig;
use crate::error::{Result, WorkflowError};
use crate::scheduler::{self, Reminder, WorkflowKind};
use crate::services::InventoryService;

pub const CUSTOMER_ORDERS: &str = "customer_orders";

/// Name of the periodic reminder that drives fulfillment.
pub const FULFILLMENT_REMINDER: &str = "fulfillment";

/// Drives customer orders from submission to a terminal state.
pub struct OrderFulfillment<S: StateStore, I: InventoryService> {
    store: S,
    inventory: I,
    wakeup_period: Duration,
    transaction_timeout: Duration,
}

impl<S: StateStore, I: InventoryService> OrderFulfillment<S, I> {
    pub fn new(store: S, inventory: I, config: &WorkflowConfig) -> Self {
        Self {
            store,
            inventory,
            wakeup_period: config.order_wakeup_period,
            transaction_timeout: config.transaction_timeout,
        }
    }

    fn begin(&self) -> Transaction<'_> {
        self.store.begin_with_timeout(self.transaction_timeout)
    }

    /// Stores the cart of a new order and schedules its wake-ups.
    #[tracing::instrument(skip(self, items), fields(%order_id, items = items.len()))]
    pub async fn submit_order(
        &self,
        order_id: OrderId,
        items: Vec<CustomerOrderItem>,
    ) -> Result<()> {
        let now = Utc::now();
        let key = order_id.to_string();
        let mut tx = self.begin();

        let mut order = tx
            .get::<CustomerOrder>(CUSTOMER_ORDERS, &key)
            .await?
            .unwrap_or_else(|| CustomerOrder::new(order_id));
        order
            .submit(items, now)
            .map_err(domain::DomainError::from)?;

        tx.set(CUSTOMER_ORDERS, &key, &order)?;
        scheduler::register(
            &mut tx,
            &Reminder::new(
                WorkflowKind::OrderFulfillment,
                &key,
                FULFILLMENT_REMINDER,
                self.wakeup_period,
                self.wakeup_period,
                now,
            ),
        )?;
        tx.commit().await?;

        metrics::counter!("orders_submitted_total").increment(1);
        tracing::info!("order submitted");
        Ok(())
    }

    /// Runs one fulfillment pass and returns the status it ended in.
    ///
    /// Errors from the inventory service propagate unchanged; the order keeps
    /// its fingerprint and the next wake-up retries the whole pass.
    #[tracing::instrument(skip(self), fields(%order_id))]
    pub async fn on_wakeup(&self, order_id: OrderId) -> Result<OrderStatus> {
        let started = Instant::now();
        let key = order_id.to_string();

        let mut order = {
            let mut tx = self.begin();
            let Some(mut order) = tx.get::<CustomerOrder>(CUSTOMER_ORDERS, &key).await? else {
                return Err(domain::DomainError::from(OrderError::NotFound(order_id)).into());
            };

            if order.status().is_terminal() {
                tracing::warn!(status = %order.status(), "wake-up for finished order, unregistering");
                scheduler::unregister(
                    &mut tx,
                    WorkflowKind::OrderFulfillment,
                    &key,
                    FULFILLMENT_REMINDER,
                );
                tx.commit().await?;
                return Ok(order.status());
            }

            order
                .begin_fulfillment(Utc::now())
                .map_err(domain::DomainError::from)?;
            tx.set(CUSTOMER_ORDERS, &key, &order)?;
            tx.commit().await?;
            order
        };

        let fingerprint = order.fingerprint();
        tracing::debug!(sequence = fingerprint.sequence, "fulfillment pass started");

        for (index, line) in order.pending_items() {
            if !self.inventory.is_item_known(line.item_id).await? {
                tracing::info!(item_id = %line.item_id, "order references unknown item, canceling");
                order.cancel(Utc::now()).map_err(domain::DomainError::from)?;
                self.persist(&order).await?;
                metrics::counter!("orders_canceled_total").increment(1);
                return Ok(OrderStatus::Canceled);
            }

            let removed = self
                .inventory
                .remove_stock(line.item_id, line.fulfillment_remaining(), fingerprint)
                .await?;
            order.record_removal(index, removed);
            tracing::debug!(
                item_id = %line.item_id,
                requested = line.fulfillment_remaining(),
                removed,
                "line item supplied"
            );
        }

        let status = order
            .complete_wakeup(Utc::now())
            .map_err(domain::DomainError::from)?;
        self.persist(&order).await?;

        match status {
            OrderStatus::Shipped => metrics::counter!("orders_shipped_total").increment(1),
            _ => metrics::counter!("orders_backordered_total").increment(1),
        }
        metrics::histogram!("order_wakeup_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        tracing::info!(%status, "fulfillment pass finished");
        Ok(status)
    }

    /// Writes the order back, dropping its reminder if it is finished.
    async fn persist(&self, order: &CustomerOrder) -> Result<()> {
        let key = order.id().to_string();
        let mut tx = self.begin();
        let current = tx
            .get::<CustomerOrder>(CUSTOMER_ORDERS, &key)
            .await?
            .map_or(OrderStatus::New, |o| o.status());
        if current != OrderStatus::InProcess {
            return Err(WorkflowError::Domain(
                OrderError::InvalidStateTransition {
                    current_state: current,
                    action: "finish wake-up",
                }
                .into(),
            ));
        }

        tx.set(CUSTOMER_ORDERS, &key, order)?;
        if order.status().is_terminal() {
            scheduler::unregister(
                &mut tx,
                WorkflowKind::OrderFulfillment,
                &key,
                FULFILLMENT_REMINDER,
            );
        }
        tx.commit().await?;
        Ok(())
    }

    /// Returns the last committed status. An order nobody submitted is `New`.
    pub async fn get_status(&self, order_id: OrderId) -> Result<OrderStatus> {
        Ok(self
            .get_order(order_id)
            .await?
            .map_or(OrderStatus::New, |order| order.status()))
    }

    /// Loads the full order record.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<CustomerOrder>> {
        let mut tx = self.begin();
        Ok(tx.get(CUSTOMER_ORDERS, &order_id.to_string()).await?)
    }
}
