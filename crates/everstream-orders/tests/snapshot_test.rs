//! Integration tests for the snapshot service and snapshot-based loading.

use std::sync::Arc;

use chrono::{TimeZone, Utc};
use everstream_core::aggregate::AggregateRoot;
use everstream_core::clock::Clock;
use everstream_core::error::Error;
use everstream_core::snapshot::{
    DefaultSnapshotStrategy, SnapshotRecord, SnapshotRepository, SnapshotService,
};
use everstream_core::store::EventStore;
use everstream_orders::domain::aggregates::{Order, OrderStatus};
use everstream_test_support::{
    FailingSnapshotRepository, FixedClock, InMemoryEventLog, InMemorySnapshotRepository,
};
use uuid::Uuid;

mod common;
use common::{fixed_clock, snapshotting_store};

/// Creates an order and adds `item_count` items, committing after every
/// command the way a command handler would.
async fn build_order(
    store: &EventStore,
    order_id: Uuid,
    customer_id: Uuid,
    item_count: usize,
) -> Order {
    let clock = fixed_clock();
    let mut order = Order::create(order_id, customer_id, Uuid::new_v4(), &clock);
    store.commit(&mut order).await.unwrap();

    for i in 0..item_count {
        let mut order: Order = store.load_aggregate(order_id).await.unwrap().unwrap();
        order
            .add_item(
                Uuid::new_v4(),
                format!("Item {i}"),
                1,
                1000,
                Uuid::new_v4(),
                &clock,
            )
            .unwrap();
        store.commit(&mut order).await.unwrap();
    }

    store.load_aggregate(order_id).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_snapshot_created_once_version_reaches_frequency() {
    // Arrange: frequency 5.
    let snapshots = Arc::new(InMemorySnapshotRepository::new());
    let store = snapshotting_store(
        Arc::new(InMemoryEventLog::new()),
        Arc::clone(&snapshots) as Arc<dyn SnapshotRepository>,
        5,
    );
    let order_id = Uuid::new_v4();

    // Act: create (v1) + 3 items (v2..v4), still below the threshold.
    build_order(&store, order_id, Uuid::new_v4(), 3).await;
    assert_eq!(snapshots.latest_version(order_id, Order::AGGREGATE_TYPE), None);

    // One more item takes the stream to v5.
    let clock = fixed_clock();
    let mut order: Order = store.load_aggregate(order_id).await.unwrap().unwrap();
    order
        .add_item(Uuid::new_v4(), "Item 4".to_owned(), 1, 1000, Uuid::new_v4(), &clock)
        .unwrap();
    store.commit(&mut order).await.unwrap();

    // Assert
    assert_eq!(
        snapshots.latest_version(order_id, Order::AGGREGATE_TYPE),
        Some(5)
    );
    assert_eq!(snapshots.snapshot_count(), 1);
}

#[tokio::test]
async fn test_snapshot_plus_tail_replay_equals_full_replay() {
    // Arrange: frequency 5; 7 events total so the snapshot sits at v5 with
    // a two-event tail.
    let log = Arc::new(InMemoryEventLog::new());
    let snapshots = Arc::new(InMemorySnapshotRepository::new());
    let store = snapshotting_store(
        Arc::clone(&log),
        Arc::clone(&snapshots) as Arc<dyn SnapshotRepository>,
        5,
    );
    let order_id = Uuid::new_v4();
    let customer_id = Uuid::new_v4();
    build_order(&store, order_id, customer_id, 6).await;
    assert_eq!(
        snapshots.latest_version(order_id, Order::AGGREGATE_TYPE),
        Some(5)
    );

    // Act: load via snapshot + tail, and via full replay on a store with
    // no snapshot service.
    let from_snapshot: Order = store.load_aggregate(order_id).await.unwrap().unwrap();
    let plain = common::plain_store(log);
    let from_scratch: Order = plain.load_aggregate(order_id).await.unwrap().unwrap();

    // Assert: snapshot/replay equivalence.
    assert_eq!(from_snapshot.version(), 7);
    assert_eq!(from_snapshot.version(), from_scratch.version());
    assert_eq!(from_snapshot.status(), from_scratch.status());
    assert_eq!(from_snapshot.customer_id(), from_scratch.customer_id());
    assert_eq!(from_snapshot.items(), from_scratch.items());
    assert_eq!(from_snapshot.total_cents(), from_scratch.total_cents());
}

#[tokio::test]
async fn test_new_snapshot_replaces_prior_row() {
    // Arrange: frequency 2 so snapshots land at v2 and v4.
    let snapshots = Arc::new(InMemorySnapshotRepository::new());
    let store = snapshotting_store(
        Arc::new(InMemoryEventLog::new()),
        Arc::clone(&snapshots) as Arc<dyn SnapshotRepository>,
        2,
    );
    let order_id = Uuid::new_v4();

    // Act
    build_order(&store, order_id, Uuid::new_v4(), 3).await;

    // Assert: one row per (id, type), at the latest snapshot version.
    assert_eq!(snapshots.snapshot_count(), 1);
    assert_eq!(
        snapshots.latest_version(order_id, Order::AGGREGATE_TYPE),
        Some(4)
    );
}

#[tokio::test]
async fn test_snapshot_failure_never_fails_the_append() {
    // Arrange: a snapshot repository that always fails, frequency 1 so
    // every commit wants a snapshot.
    let store = snapshotting_store(
        Arc::new(InMemoryEventLog::new()),
        Arc::new(FailingSnapshotRepository),
        1,
    );
    let clock = fixed_clock();
    let order_id = Uuid::new_v4();

    // Act: the append path must succeed regardless.
    let mut order = Order::create(order_id, Uuid::new_v4(), Uuid::new_v4(), &clock);
    store.commit(&mut order).await.unwrap();
    for i in 0..2 {
        order
            .add_item(
                Uuid::new_v4(),
                format!("Item {i}"),
                1,
                1000,
                Uuid::new_v4(),
                &clock,
            )
            .unwrap();
        store.commit(&mut order).await.unwrap();
    }

    // Assert
    assert_eq!(order.version(), 3);
    assert_eq!(order.status(), OrderStatus::Confirmed);
    assert_eq!(store.current_version(order_id).await.unwrap(), 3);
}

#[tokio::test]
async fn test_corrupt_snapshot_fails_restoration() {
    // Arrange: a snapshot row whose state is not an Order.
    let log = Arc::new(InMemoryEventLog::new());
    let snapshots = Arc::new(InMemorySnapshotRepository::new());
    let store = snapshotting_store(
        Arc::clone(&log),
        Arc::clone(&snapshots) as Arc<dyn SnapshotRepository>,
        100,
    );
    let order_id = Uuid::new_v4();
    build_order(&store, order_id, Uuid::new_v4(), 1).await;
    snapshots
        .upsert(SnapshotRecord {
            aggregate_id: order_id,
            aggregate_type: Order::AGGREGATE_TYPE.to_owned(),
            version: 2,
            state: serde_json::json!("garbage"),
            taken_at: Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
        })
        .await
        .unwrap();

    // Act
    let result: Result<Option<Order>, Error> = store.load_aggregate(order_id).await;

    // Assert: the caller explicitly asked to load from a snapshot, so the
    // failure propagates.
    match result.unwrap_err() {
        Error::SnapshotRestoration(msg) => assert!(msg.contains("deserialize")),
        other => panic!("expected SnapshotRestoration, got {other:?}"),
    }
}

#[tokio::test]
async fn test_load_without_snapshot_replays_full_stream() {
    // Arrange: frequency high enough that no snapshot is ever taken.
    let snapshots = Arc::new(InMemorySnapshotRepository::new());
    let store = snapshotting_store(
        Arc::new(InMemoryEventLog::new()),
        Arc::clone(&snapshots) as Arc<dyn SnapshotRepository>,
        100,
    );
    let order_id = Uuid::new_v4();
    build_order(&store, order_id, Uuid::new_v4(), 2).await;
    assert_eq!(snapshots.snapshot_count(), 0);

    // Act
    let order: Order = store.load_aggregate(order_id).await.unwrap().unwrap();

    // Assert
    assert_eq!(order.version(), 3);
    assert_eq!(order.total_cents(), 2000);
}

#[tokio::test]
async fn test_load_missing_aggregate_returns_none() {
    // Arrange
    let store = snapshotting_store(
        Arc::new(InMemoryEventLog::new()),
        Arc::new(InMemorySnapshotRepository::new()),
        5,
    );

    // Act
    let loaded: Option<Order> = store.load_aggregate(Uuid::new_v4()).await.unwrap();

    // Assert
    assert!(loaded.is_none());
}

#[tokio::test]
async fn test_forced_snapshot_ignores_strategy() {
    // Arrange: a service alone, with a frequency that would never fire.
    let snapshots = Arc::new(InMemorySnapshotRepository::new());
    let strategy = Arc::new(DefaultSnapshotStrategy::new(1000).unwrap());
    let clock: Arc<dyn Clock> = Arc::new(FixedClock(
        Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap(),
    ));
    let service = SnapshotService::new(
        Arc::clone(&snapshots) as Arc<dyn SnapshotRepository>,
        strategy,
        clock,
    );
    let order = Order::create(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), &fixed_clock());

    // Act
    service.create_snapshot(&order).await.unwrap();

    // Assert
    assert_eq!(
        snapshots.latest_version(order.aggregate_id(), Order::AGGREGATE_TYPE),
        Some(1)
    );
}
