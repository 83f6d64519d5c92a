//! Integration tests for the fulfillment workflows.
//!
//! The runtime tests use zero wake-up delays so every tick fires every
//! registered reminder; time is driven by calling `tick` directly.

use std::time::Duration;

use chrono::Utc;
use common::{InventoryItemId, OrderId};
use domain::{
    CustomerOrderItem, DomainError, Fingerprint, InventoryItem, Money, OrderError, OrderStatus,
    RestockError, RestockRequest, RestockStatus,
};
use state_store::InMemoryStateStore;
use workflow::{
    InMemoryInventoryService, OrderFulfillment, TickReport, WorkflowConfig, WorkflowError,
    WorkflowRuntime,
};

fn immediate() -> WorkflowConfig {
    WorkflowConfig {
        order_wakeup_period: Duration::ZERO,
        restock_first_wakeup: Duration::ZERO,
        restock_wakeup_period: Duration::ZERO,
        ..WorkflowConfig::default()
    }
}

struct TestHarness {
    runtime: WorkflowRuntime<InMemoryStateStore>,
}

impl TestHarness {
    fn new() -> Self {
        Self {
            runtime: WorkflowRuntime::new(InMemoryStateStore::new(), immediate()),
        }
    }

    async fn create_item(&self, available: u32, threshold: u32, max: u32) -> InventoryItemId {
        let item = InventoryItem::new(
            InventoryItemId::new(),
            "Widget",
            Money::from_cents(2500),
            available,
            threshold,
            max,
        )
        .unwrap();
        let id = item.id;
        self.runtime.ledger().create_item(item).await.unwrap();
        id
    }

    async fn submit(&self, items: Vec<CustomerOrderItem>) -> OrderId {
        let order_id = OrderId::new();
        self.runtime
            .orders()
            .submit_order(order_id, items)
            .await
            .unwrap();
        order_id
    }

    async fn tick(&self) -> TickReport {
        self.runtime.tick(Utc::now()).await.unwrap()
    }

    async fn status(&self, order_id: OrderId) -> OrderStatus {
        self.runtime.orders().get_status(order_id).await.unwrap()
    }

    async fn stock(&self, item_id: InventoryItemId) -> u32 {
        self.runtime
            .ledger()
            .get_item(item_id)
            .await
            .unwrap()
            .unwrap()
            .available_stock()
    }
}

mod end_to_end {
    use super::*;

    #[tokio::test]
    async fn restock_cycle_and_replayed_removal() {
        let harness = TestHarness::new();
        let item_id = harness.create_item(4, 1, 10).await;
        let order_id = harness.submit(vec![CustomerOrderItem::new(item_id, 4)]).await;

        harness.tick().await;
        assert_eq!(harness.status(order_id).await, OrderStatus::Shipped);
        assert_eq!(harness.stock(item_id).await, 0);

        let sweep = harness.runtime.sweep_thresholds().await.unwrap();
        assert_eq!(sweep.requested, vec![RestockRequest::new(item_id, 10)]);

        harness.tick().await;
        assert_eq!(
            harness.runtime.pipelines().status(item_id).await.unwrap(),
            Some(RestockStatus::Manufacturing)
        );
        harness.tick().await;
        assert_eq!(
            harness.runtime.pipelines().status(item_id).await.unwrap(),
            Some(RestockStatus::Completed)
        );

        let deliveries = harness.runtime.dispatcher().drain_all().await.unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].added, 10);
        assert_eq!(harness.stock(item_id).await, 10);

        // The first wake-up removed under sequence 0.
        let replayed = harness
            .runtime
            .ledger()
            .remove_stock(item_id, 4, Fingerprint::new(order_id, 0))
            .await
            .unwrap();
        assert_eq!(replayed, 4);
        assert_eq!(harness.stock(item_id).await, 10);
    }

    #[tokio::test]
    async fn backordered_order_ships_after_restock() {
        let harness = TestHarness::new();
        let item_id = harness.create_item(2, 1, 6).await;
        let order_id = harness.submit(vec![CustomerOrderItem::new(item_id, 5)]).await;

        harness.tick().await;
        assert_eq!(harness.status(order_id).await, OrderStatus::Backordered);
        assert_eq!(harness.stock(item_id).await, 0);

        harness.runtime.sweep_thresholds().await.unwrap();
        // Order retries, restock accepted -> manufacturing.
        harness.tick().await;
        assert_eq!(harness.status(order_id).await, OrderStatus::Backordered);
        // Restock completes.
        harness.tick().await;
        harness.runtime.dispatcher().drain_all().await.unwrap();
        assert_eq!(harness.stock(item_id).await, 6);

        harness.tick().await;
        assert_eq!(harness.status(order_id).await, OrderStatus::Shipped);
        assert_eq!(harness.stock(item_id).await, 3);

        let order = harness
            .runtime
            .orders()
            .get_order(order_id)
            .await
            .unwrap()
            .unwrap();
        assert!(order.items().iter().all(|item| item.is_fulfilled()));
    }

    #[tokio::test]
    async fn competing_orders_never_oversell() {
        let harness = TestHarness::new();
        let item_id = harness.create_item(4, 0, 10).await;
        let first = harness.submit(vec![CustomerOrderItem::new(item_id, 3)]).await;
        let second = harness.submit(vec![CustomerOrderItem::new(item_id, 3)]).await;

        let report = harness.tick().await;
        assert_eq!(report.fired, 2);

        // A pass that lost a commit race stays InProcess until the next tick.
        let mut statuses = [harness.status(first).await, harness.status(second).await];
        for _ in 0..10 {
            if !statuses.contains(&OrderStatus::InProcess) {
                break;
            }
            harness.tick().await;
            statuses = [harness.status(first).await, harness.status(second).await];
        }
        assert!(statuses.contains(&OrderStatus::Shipped));
        assert!(statuses.contains(&OrderStatus::Backordered));
        assert_eq!(harness.stock(item_id).await, 0);
    }
}

#[tokio::test]
async fn repeated_item_lines_rejected_before_any_removal() {
    let harness = TestHarness::new();
    let item_id = harness.create_item(10, 1, 10).await;
    let order_id = OrderId::new();

    let err = harness
        .runtime
        .orders()
        .submit_order(
            order_id,
            vec![
                CustomerOrderItem::new(item_id, 5),
                CustomerOrderItem::new(item_id, 2),
            ],
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        WorkflowError::Domain(DomainError::Order(OrderError::DuplicateItem(id))) if id == item_id
    ));

    let report = harness.tick().await;
    assert_eq!(report.fired, 0);
    assert_eq!(harness.status(order_id).await, OrderStatus::New);
    assert_eq!(harness.stock(item_id).await, 10);
}

mod restock {
    use super::*;

    #[tokio::test]
    async fn threshold_crossing_requests_once() {
        let harness = TestHarness::new();
        let item_id = harness.create_item(1, 1, 10).await;

        let first = harness.runtime.sweep_thresholds().await.unwrap();
        assert_eq!(first.requested.len(), 1);

        let second = harness.runtime.sweep_thresholds().await.unwrap();
        assert!(second.requested.is_empty());
        assert_eq!(second.already_in_progress, 0);

        let item = harness.runtime.ledger().get_item(item_id).await.unwrap().unwrap();
        assert!(item.is_on_reorder());
    }

    #[tokio::test]
    async fn duplicate_accept_rejected_while_manufacturing() {
        let harness = TestHarness::new();
        let item_id = harness.create_item(0, 1, 10).await;
        let pipelines = harness.runtime.pipelines();

        pipelines
            .accept(RestockRequest::new(item_id, 10))
            .await
            .unwrap();
        harness.tick().await;
        assert_eq!(
            pipelines.status(item_id).await.unwrap(),
            Some(RestockStatus::Manufacturing)
        );

        let err = pipelines
            .accept(RestockRequest::new(item_id, 10))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DomainError::Restock(RestockError::AlreadyInProgress { .. })
        ));
    }

    #[tokio::test]
    async fn manual_restock_sets_flag_on_next_sweep() {
        let harness = TestHarness::new();
        let item_id = harness.create_item(0, 1, 10).await;
        harness
            .runtime
            .pipelines()
            .accept(RestockRequest::new(item_id, 10))
            .await
            .unwrap();

        let sweep = harness.runtime.sweep_thresholds().await.unwrap();
        assert!(sweep.requested.is_empty());
        assert_eq!(sweep.already_in_progress, 1);

        let item = harness.runtime.ledger().get_item(item_id).await.unwrap().unwrap();
        assert!(item.is_on_reorder());
    }
}

mod with_mock_inventory {
    use super::*;

    fn workflow(
        inventory: &InMemoryInventoryService,
    ) -> OrderFulfillment<InMemoryStateStore, InMemoryInventoryService> {
        OrderFulfillment::new(InMemoryStateStore::new(), inventory.clone(), &immediate())
    }

    #[tokio::test]
    async fn unknown_item_cancels_on_first_wakeup() {
        let inventory = InMemoryInventoryService::new();
        let orders = workflow(&inventory);
        let order_id = OrderId::new();
        orders
            .submit_order(order_id, vec![CustomerOrderItem::new(InventoryItemId::new(), 7)])
            .await
            .unwrap();

        assert_eq!(
            orders.on_wakeup(order_id).await.unwrap(),
            OrderStatus::Canceled
        );
        assert_eq!(
            orders.get_status(order_id).await.unwrap(),
            OrderStatus::Canceled
        );
    }

    #[tokio::test]
    async fn one_unit_per_wakeup_backorders_four_times() {
        let inventory = InMemoryInventoryService::new();
        let item_id = InventoryItemId::new();
        inventory.add_item(item_id, 100).await;
        inventory.set_supply_per_call(Some(1)).await;
        let orders = workflow(&inventory);
        let order_id = OrderId::new();
        orders
            .submit_order(order_id, vec![CustomerOrderItem::new(item_id, 5)])
            .await
            .unwrap();

        let mut statuses = Vec::new();
        for _ in 0..5 {
            statuses.push(orders.on_wakeup(order_id).await.unwrap());
        }

        assert_eq!(
            statuses,
            vec![
                OrderStatus::Backordered,
                OrderStatus::Backordered,
                OrderStatus::Backordered,
                OrderStatus::Backordered,
                OrderStatus::Shipped,
            ]
        );
        assert_eq!(inventory.stock_of(item_id).await, Some(95));
        let order = orders.get_order(order_id).await.unwrap().unwrap();
        assert_eq!(order.request_sequence(), 5);
    }

    #[tokio::test]
    async fn transient_failure_does_not_change_business_state() {
        let inventory = InMemoryInventoryService::new();
        let item_id = InventoryItemId::new();
        inventory.add_item(item_id, 1).await;
        let orders = workflow(&inventory);
        let order_id = OrderId::new();
        orders
            .submit_order(order_id, vec![CustomerOrderItem::new(item_id, 1)])
            .await
            .unwrap();

        inventory.set_fail(true).await;
        for _ in 0..3 {
            assert!(orders.on_wakeup(order_id).await.unwrap_err().is_transient());
        }
        assert_eq!(
            orders.get_status(order_id).await.unwrap(),
            OrderStatus::InProcess
        );

        inventory.set_fail(false).await;
        assert_eq!(
            orders.on_wakeup(order_id).await.unwrap(),
            OrderStatus::Shipped
        );
    }
}
