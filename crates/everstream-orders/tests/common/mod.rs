//! Shared test helpers for Order context integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use everstream_core::clock::Clock;
use everstream_core::config::EngineConfig;
use everstream_core::event::EventMetadata;
use everstream_core::schema::SchemaRegistry;
use everstream_core::snapshot::{DefaultSnapshotStrategy, SnapshotRepository, SnapshotService};
use everstream_core::store::EventStore;
use everstream_orders::domain::events::{
    ORDER_CREATED_EVENT_TYPE, ORDER_CREATED_SCHEMA_VERSION, ORDER_ITEM_ADDED_EVENT_TYPE,
    ORDER_ITEM_ADDED_SCHEMA_VERSION, OrderCreatedEvent, OrderEvent, OrderEventKind,
    OrderItemAddedEvent, register_order_event_types,
};
use everstream_test_support::{FixedClock, InMemoryEventLog};
use uuid::Uuid;

/// Fixed timestamp used across integration tests.
pub fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, 0, 0).unwrap()
}

/// Fixed timestamp offset by whole minutes, for distinct event times.
pub fn fixed_time_plus(minutes: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 1, 15, 10, minutes, 0).unwrap()
}

/// A clock frozen at [`fixed_time`].
pub fn fixed_clock() -> FixedClock {
    FixedClock(fixed_time())
}

/// A registry with every Order event type registered.
pub fn order_registry() -> Arc<SchemaRegistry> {
    let mut registry = SchemaRegistry::new();
    register_order_event_types(&mut registry).unwrap();
    Arc::new(registry)
}

/// An event store over the given in-memory log, without snapshotting.
pub fn plain_store(log: Arc<InMemoryEventLog>) -> EventStore {
    EventStore::new(log, order_registry(), &EngineConfig::default())
}

/// An event store with a snapshot service at the given frequency.
pub fn snapshotting_store(
    log: Arc<InMemoryEventLog>,
    snapshots: Arc<dyn SnapshotRepository>,
    frequency: i64,
) -> EventStore {
    let strategy = Arc::new(DefaultSnapshotStrategy::new(frequency).unwrap());
    let clock: Arc<dyn Clock> = Arc::new(fixed_clock());
    let service = Arc::new(SnapshotService::new(snapshots, strategy, clock));
    EventStore::new(log, order_registry(), &EngineConfig::default()).with_snapshots(service)
}

/// Builds an `OrderCreated` domain event.
pub fn order_created_event(
    order_id: Uuid,
    customer_id: Uuid,
    occurred_at: DateTime<Utc>,
) -> OrderEvent {
    OrderEvent {
        metadata: EventMetadata {
            event_id: Uuid::new_v4(),
            event_type: ORDER_CREATED_EVENT_TYPE.to_owned(),
            stream_id: order_id,
            version: 1,
            schema_version: ORDER_CREATED_SCHEMA_VERSION,
            correlation_id: Uuid::new_v4(),
            causation_id: None,
            occurred_at,
        },
        kind: OrderEventKind::OrderCreated(OrderCreatedEvent { customer_id }),
    }
}

/// Builds an `OrderItemAdded` domain event at the given stream version.
pub fn order_item_added_event(
    order_id: Uuid,
    version: i64,
    quantity: u32,
    price_cents: i64,
    occurred_at: DateTime<Utc>,
) -> OrderEvent {
    OrderEvent {
        metadata: EventMetadata {
            event_id: Uuid::new_v4(),
            event_type: ORDER_ITEM_ADDED_EVENT_TYPE.to_owned(),
            stream_id: order_id,
            version,
            schema_version: ORDER_ITEM_ADDED_SCHEMA_VERSION,
            correlation_id: Uuid::new_v4(),
            causation_id: None,
            occurred_at,
        },
        kind: OrderEventKind::OrderItemAdded(OrderItemAddedEvent {
            product_id: Uuid::new_v4(),
            product_name: "Lamp".to_owned(),
            quantity,
            price_cents,
            discount_percent: None,
        }),
    }
}
