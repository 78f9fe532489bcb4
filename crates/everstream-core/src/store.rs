//! Event store append/read protocol.

use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{Semaphore, SemaphorePermit};
use uuid::Uuid;

use crate::aggregate::AggregateRoot;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::event::DomainEvent;
use crate::log::{EventLog, StoredEvent};
use crate::schema::SchemaRegistry;
use crate::snapshot::SnapshotService;

/// Maximum page size for global reads; larger requests are clamped.
pub const MAX_PAGE_SIZE: i64 = 1000;

/// Append-only per-stream event store with optimistic concurrency.
///
/// The store validates every appended event against the schema registry,
/// enforces the expected-version gate, and persists batches atomically
/// through an abstract durable log. Admission to the log is bounded by a
/// semaphore sized from [`EngineConfig::append_concurrency_limit`]; a
/// caller cancelled while waiting for a permit does not leak it.
#[derive(Clone)]
pub struct EventStore {
    log: Arc<dyn EventLog>,
    registry: Arc<SchemaRegistry>,
    snapshots: Option<Arc<SnapshotService>>,
    limiter: Arc<Semaphore>,
}

impl EventStore {
    /// Creates an event store over the given durable log.
    #[must_use]
    pub fn new(log: Arc<dyn EventLog>, registry: Arc<SchemaRegistry>, config: &EngineConfig) -> Self {
        Self {
            log,
            registry,
            snapshots: None,
            limiter: Arc::new(Semaphore::new(config.append_concurrency_limit())),
        }
    }

    /// Attaches a snapshot service, enabling the post-append snapshot hook
    /// in [`commit`](Self::commit) and snapshot-based loading in
    /// [`load_aggregate`](Self::load_aggregate).
    #[must_use]
    pub fn with_snapshots(mut self, snapshots: Arc<SnapshotService>) -> Self {
        self.snapshots = Some(snapshots);
        self
    }

    async fn permit(&self) -> Result<SemaphorePermit<'_>, Error> {
        self.limiter
            .acquire()
            .await
            .map_err(|_| Error::Store("event store admission gate is closed".into()))
    }

    /// Appends `events` to `stream_id`, expecting the stream to currently
    /// be at `expected_version`.
    ///
    /// The whole batch is validated before anything is written; on the
    /// first validation failure nothing is appended. The durable log
    /// persists the batch as one atomic unit.
    ///
    /// # Errors
    ///
    /// - [`Error::Concurrency`] if the stream's current version differs
    ///   from `expected_version`. This check is the sole consistency gate
    ///   for concurrent writers to the same stream.
    /// - [`Error::Schema`] if any event fails registry validation.
    /// - [`Error::Store`] for underlying storage failures.
    pub async fn append_events<E: DomainEvent>(
        &self,
        stream_id: Uuid,
        events: &[E],
        expected_version: i64,
    ) -> Result<(), Error> {
        let _permit = self.permit().await?;

        let actual = self.log.max_version(stream_id).await?.unwrap_or(0);
        if actual != expected_version {
            return Err(Error::Concurrency {
                stream_id,
                expected: expected_version,
                actual,
            });
        }

        for event in events {
            self.registry.validate_event(event)?;
        }

        if events.is_empty() {
            return Ok(());
        }

        let records: Vec<StoredEvent> = events
            .iter()
            .map(|event| StoredEvent::from_event(stream_id, event))
            .collect();

        self.log.append(&records).await?;

        tracing::debug!(%stream_id, count = records.len(), "appended events");
        Ok(())
    }

    /// Appends an aggregate's uncommitted events, clears them, and runs the
    /// snapshot-if-needed hook on the same in-memory aggregate.
    ///
    /// The expected version is the stream version the caller observed
    /// before executing the command: the aggregate's current version minus
    /// its uncommitted-event count. A snapshot failure after a successful
    /// append is logged and swallowed; it never rolls back or fails the
    /// append.
    ///
    /// # Errors
    ///
    /// Propagates [`Error::Concurrency`], [`Error::Schema`], and
    /// [`Error::Store`] from the append path.
    #[allow(clippy::cast_possible_wrap)]
    pub async fn commit<A>(&self, aggregate: &mut A) -> Result<(), Error>
    where
        A: AggregateRoot + Serialize + Sync,
    {
        if aggregate.uncommitted_events().is_empty() {
            return Ok(());
        }

        let stream_id = aggregate.aggregate_id();
        let expected_version = aggregate.version() - aggregate.uncommitted_events().len() as i64;

        self.append_events(stream_id, aggregate.uncommitted_events(), expected_version)
            .await?;
        aggregate.clear_uncommitted_events();

        if let Some(snapshots) = &self.snapshots {
            if snapshots.create_snapshot_if_needed(aggregate).await {
                tracing::debug!(
                    %stream_id,
                    aggregate_type = A::AGGREGATE_TYPE,
                    version = aggregate.version(),
                    "created snapshot after append"
                );
            }
        }

        Ok(())
    }

    /// Returns the stream's current version: the version of its last
    /// event, or 0 if the stream is empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] on storage failure.
    pub async fn current_version(&self, stream_id: Uuid) -> Result<i64, Error> {
        let _permit = self.permit().await?;
        Ok(self.log.max_version(stream_id).await?.unwrap_or(0))
    }

    /// Returns the stream's events in ascending version order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] on storage failure.
    pub async fn get_events(&self, stream_id: Uuid) -> Result<Vec<StoredEvent>, Error> {
        let _permit = self.permit().await?;
        self.log.events(stream_id).await
    }

    /// Returns the stream's events with version >= `from_version`, in
    /// ascending version order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] on storage failure.
    pub async fn get_events_from(
        &self,
        stream_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, Error> {
        let _permit = self.permit().await?;
        self.log.events_from(stream_id, from_version).await
    }

    /// Returns a page of all events across streams, ordered by
    /// `(occurred_at, version)` ascending. Used only for projection
    /// rebuild and catch-up. `limit` is clamped to [`MAX_PAGE_SIZE`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `offset` is negative or
    /// `limit` is not positive, and [`Error::Store`] on storage failure.
    pub async fn get_all_events(&self, offset: i64, limit: i64) -> Result<Vec<StoredEvent>, Error> {
        if offset < 0 {
            return Err(Error::InvalidArgument(format!(
                "offset cannot be negative, got {offset}"
            )));
        }
        if limit <= 0 {
            return Err(Error::InvalidArgument(format!(
                "limit must be greater than 0, got {limit}"
            )));
        }
        let limit = if limit > MAX_PAGE_SIZE {
            tracing::warn!(limit, max = MAX_PAGE_SIZE, "requested limit too large, clamping");
            MAX_PAGE_SIZE
        } else {
            limit
        };

        let _permit = self.permit().await?;
        self.log.all_events(offset, limit).await
    }

    /// Returns all events across streams with version >= `from_version`,
    /// ordered by `(occurred_at, version)` ascending.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] on storage failure.
    pub async fn get_all_events_from(&self, from_version: i64) -> Result<Vec<StoredEvent>, Error> {
        let _permit = self.permit().await?;
        self.log.all_events_from(from_version).await
    }

    /// Loads an aggregate: restores from the latest snapshot and replays
    /// only the events after the snapshot's version, or replays the full
    /// stream onto a fresh aggregate when no snapshot exists. Returns
    /// `None` when the aggregate has neither events nor a snapshot.
    ///
    /// Events are applied strictly in ascending version order; the result
    /// is identical whether reached via replay-from-empty or
    /// snapshot-plus-tail-replay.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotRestoration`] if a snapshot exists but
    /// cannot be deserialized, [`Error::Schema`] if a stored event cannot
    /// be decoded, and [`Error::Store`] on storage failure.
    pub async fn load_aggregate<A>(&self, aggregate_id: Uuid) -> Result<Option<A>, Error>
    where
        A: AggregateRoot + DeserializeOwned,
        for<'a> A::Event: TryFrom<&'a StoredEvent, Error = Error>,
    {
        let restored = match &self.snapshots {
            Some(snapshots) => {
                snapshots
                    .restore_from_latest_snapshot::<A>(aggregate_id)
                    .await?
            }
            None => None,
        };

        if let Some((mut aggregate, snapshot_version)) = restored {
            let tail = self
                .get_events_from(aggregate_id, snapshot_version + 1)
                .await?;
            for stored in &tail {
                aggregate.apply(&A::Event::try_from(stored)?);
            }
            tracing::debug!(
                %aggregate_id,
                snapshot_version,
                tail = tail.len(),
                "loaded aggregate from snapshot"
            );
            return Ok(Some(aggregate));
        }

        let stored_events = self.get_events(aggregate_id).await?;
        if stored_events.is_empty() {
            return Ok(None);
        }

        let mut aggregate = A::new(aggregate_id);
        for stored in &stored_events {
            aggregate.apply(&A::Event::try_from(stored)?);
        }
        Ok(Some(aggregate))
    }
}
