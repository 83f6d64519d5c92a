use common::{InventoryItemId, OrderId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{Fingerprint, InventoryItem, InventoryLedger, Money};
use state_store::InMemoryStateStore;

fn seeded_ledger(
    rt: &tokio::runtime::Runtime,
    items: usize,
) -> (InventoryLedger<InMemoryStateStore>, Vec<InventoryItemId>) {
    let ledger = InventoryLedger::new(InMemoryStateStore::new());
    let ids: Vec<_> = (0..items).map(|_| InventoryItemId::new()).collect();
    rt.block_on(async {
        for (i, id) in ids.iter().enumerate() {
            let item = InventoryItem::new(
                *id,
                format!("Product {i}"),
                Money::from_cents(100),
                u32::MAX / 2,
                10,
                u32::MAX,
            )
            .unwrap();
            ledger.create_item(item).await.unwrap();
        }
    });
    (ledger, ids)
}

fn bench_remove_stock(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (ledger, ids) = seeded_ledger(&rt, 1);
    let order_id = OrderId::new();
    let mut sequence = 0u64;

    c.bench_function("domain/remove_stock_fresh_fingerprint", |b| {
        b.iter(|| {
            sequence += 1;
            rt.block_on(async {
                ledger
                    .remove_stock(ids[0], 1, Fingerprint::new(order_id, sequence))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_duplicate_removal(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (ledger, ids) = seeded_ledger(&rt, 1);
    let fingerprint = Fingerprint::new(OrderId::new(), 0);
    rt.block_on(async { ledger.remove_stock(ids[0], 1, fingerprint).await.unwrap() });

    c.bench_function("domain/remove_stock_duplicate", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger.remove_stock(ids[0], 1, fingerprint).await.unwrap();
            });
        });
    });
}

fn bench_customer_inventory(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let (ledger, _) = seeded_ledger(&rt, 100);

    c.bench_function("domain/customer_inventory_100_items", |b| {
        b.iter(|| {
            rt.block_on(async {
                ledger.customer_inventory().await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_remove_stock,
    bench_duplicate_removal,
    bench_customer_inventory,
);
criterion_main!(benches);
