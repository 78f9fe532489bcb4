//! Integration tests for `PgEventLog` and `PgSnapshotRepository`.
//!
//! These tests require a running `PostgreSQL` instance (`DATABASE_URL`);
//! run them with `cargo test -- --ignored`.

use chrono::Utc;
use everstream_core::error::Error;
use everstream_core::log::{EventLog, StoredEvent};
use everstream_core::snapshot::{SnapshotRecord, SnapshotRepository};
use everstream_event_store::pg_event_log::PgEventLog;
use everstream_event_store::pg_snapshot_repository::PgSnapshotRepository;
use sqlx::PgPool;
use uuid::Uuid;

/// Helper to build a `StoredEvent` with sensible defaults.
fn make_stored_event(stream_id: Uuid, version: i64) -> StoredEvent {
    StoredEvent {
        event_id: Uuid::new_v4(),
        stream_id,
        event_type: "OrderCreated".to_string(),
        payload: serde_json::json!({"OrderCreated": {"customer_id": Uuid::new_v4()}}),
        version,
        schema_version: 1,
        correlation_id: Uuid::new_v4(),
        causation_id: None,
        occurred_at: Utc::now(),
    }
}

// --- event log ---

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_empty_stream_has_no_events_and_no_max_version(pool: PgPool) {
    let log = PgEventLog::new(pool);
    let stream_id = Uuid::new_v4();

    assert!(log.events(stream_id).await.unwrap().is_empty());
    assert_eq!(log.max_version(stream_id).await.unwrap(), None);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_append_and_load_round_trip(pool: PgPool) {
    let log = PgEventLog::new(pool);
    let stream_id = Uuid::new_v4();
    let event = make_stored_event(stream_id, 1);
    let expected_event_id = event.event_id;
    let expected_payload = event.payload.clone();

    log.append(&[event]).await.unwrap();

    let loaded = log.events(stream_id).await.unwrap();
    assert_eq!(loaded.len(), 1);

    let e = &loaded[0];
    assert_eq!(e.event_id, expected_event_id);
    assert_eq!(e.stream_id, stream_id);
    assert_eq!(e.event_type, "OrderCreated");
    assert_eq!(e.payload, expected_payload);
    assert_eq!(e.version, 1);
    assert_eq!(e.schema_version, 1);
    assert_eq!(e.causation_id, None);
    assert_eq!(log.max_version(stream_id).await.unwrap(), Some(1));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_append_preserves_version_order(pool: PgPool) {
    let log = PgEventLog::new(pool);
    let stream_id = Uuid::new_v4();
    let events = vec![
        make_stored_event(stream_id, 1),
        make_stored_event(stream_id, 2),
        make_stored_event(stream_id, 3),
    ];

    log.append(&events).await.unwrap();

    let loaded = log.events(stream_id).await.unwrap();
    let versions: Vec<i64> = loaded.iter().map(|e| e.version).collect();
    assert_eq!(versions, vec![1, 2, 3]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_duplicate_version_violates_unique_constraint(pool: PgPool) {
    let log = PgEventLog::new(pool);
    let stream_id = Uuid::new_v4();

    log.append(&[make_stored_event(stream_id, 1)]).await.unwrap();

    let result = log.append(&[make_stored_event(stream_id, 1)]).await;

    match result {
        Err(Error::Store(msg)) => assert!(msg.contains("unique constraint")),
        other => panic!("expected Store, got {other:?}"),
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_batch_with_duplicate_appends_nothing(pool: PgPool) {
    let log = PgEventLog::new(pool);
    let stream_id = Uuid::new_v4();
    log.append(&[make_stored_event(stream_id, 1)]).await.unwrap();

    // A batch where the second event collides must not append the first.
    let result = log
        .append(&[make_stored_event(stream_id, 2), make_stored_event(stream_id, 1)])
        .await;

    assert!(result.is_err());
    let loaded = log.events(stream_id).await.unwrap();
    assert_eq!(loaded.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_events_from_is_inclusive(pool: PgPool) {
    let log = PgEventLog::new(pool);
    let stream_id = Uuid::new_v4();
    log.append(&[
        make_stored_event(stream_id, 1),
        make_stored_event(stream_id, 2),
        make_stored_event(stream_id, 3),
    ])
    .await
    .unwrap();

    let tail = log.events_from(stream_id, 2).await.unwrap();

    let versions: Vec<i64> = tail.iter().map(|e| e.version).collect();
    assert_eq!(versions, vec![2, 3]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_all_events_pages_in_global_order(pool: PgPool) {
    let log = PgEventLog::new(pool);
    let stream_a = Uuid::new_v4();
    let stream_b = Uuid::new_v4();
    log.append(&[make_stored_event(stream_a, 1)]).await.unwrap();
    log.append(&[make_stored_event(stream_b, 1)]).await.unwrap();
    log.append(&[make_stored_event(stream_a, 2)]).await.unwrap();

    let first = log.all_events(0, 2).await.unwrap();
    let second = log.all_events(2, 2).await.unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 1);
}

// --- snapshot repository ---

fn make_snapshot(aggregate_id: Uuid, version: i64) -> SnapshotRecord {
    SnapshotRecord {
        aggregate_id,
        aggregate_type: "Order".to_string(),
        version,
        state: serde_json::json!({"id": aggregate_id, "version": version}),
        taken_at: Utc::now(),
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_snapshot_upsert_round_trip(pool: PgPool) {
    let repo = PgSnapshotRepository::new(pool);
    let aggregate_id = Uuid::new_v4();

    repo.upsert(make_snapshot(aggregate_id, 5)).await.unwrap();

    let loaded = repo.find_latest(aggregate_id, "Order").await.unwrap().unwrap();
    assert_eq!(loaded.aggregate_id, aggregate_id);
    assert_eq!(loaded.aggregate_type, "Order");
    assert_eq!(loaded.version, 5);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_snapshot_upsert_replaces_prior_row(pool: PgPool) {
    let repo = PgSnapshotRepository::new(pool);
    let aggregate_id = Uuid::new_v4();

    repo.upsert(make_snapshot(aggregate_id, 5)).await.unwrap();
    repo.upsert(make_snapshot(aggregate_id, 10)).await.unwrap();

    let loaded = repo.find_latest(aggregate_id, "Order").await.unwrap().unwrap();
    assert_eq!(loaded.version, 10);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_snapshot_missing_returns_none(pool: PgPool) {
    let repo = PgSnapshotRepository::new(pool);

    let loaded = repo.find_latest(Uuid::new_v4(), "Order").await.unwrap();

    assert!(loaded.is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a PostgreSQL database"]
async fn test_snapshot_delete_all_removes_the_row(pool: PgPool) {
    let repo = PgSnapshotRepository::new(pool);
    let aggregate_id = Uuid::new_v4();
    repo.upsert(make_snapshot(aggregate_id, 5)).await.unwrap();

    repo.delete_all(aggregate_id, "Order").await.unwrap();

    assert!(repo.find_latest(aggregate_id, "Order").await.unwrap().is_none());
}
