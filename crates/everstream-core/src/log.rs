//! Durable append-only log abstraction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Error;
use crate::event::DomainEvent;

/// Stored representation of a domain event, as exchanged with the durable
/// log.
#[derive(Debug, Clone)]
pub struct StoredEvent {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Stream this event belongs to.
    pub stream_id: Uuid,
    /// Event type tag for deserialization routing.
    pub event_type: String,
    /// Serialized event payload (embeds the type tag).
    pub payload: serde_json::Value,
    /// Version within the stream.
    pub version: i64,
    /// Shape version of the payload.
    pub schema_version: i32,
    /// Correlation ID for tracing.
    pub correlation_id: Uuid,
    /// Causation ID linking to the causing event, if any.
    pub causation_id: Option<Uuid>,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Builds the stored record for `event`, keyed to `stream_id`.
    pub fn from_event<E: DomainEvent>(stream_id: Uuid, event: &E) -> Self {
        let meta = event.metadata();
        Self {
            event_id: meta.event_id,
            stream_id,
            event_type: event.event_type().to_owned(),
            payload: event.to_payload(),
            version: meta.version,
            schema_version: event.schema_version(),
            correlation_id: meta.correlation_id,
            causation_id: meta.causation_id,
            occurred_at: meta.occurred_at,
        }
    }
}

/// Abstract durable append-only log.
///
/// Implementations must enforce a uniqueness constraint on
/// `(stream_id, version)` (the last-resort guard against concurrent
/// writers) and order global reads by `(occurred_at, version)` ascending.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Durably persists all events as one atomic unit. Either every event
    /// in the batch is appended or none is.
    async fn append(&self, events: &[StoredEvent]) -> Result<(), Error>;

    /// Returns the version of the stream's last event, or `None` for an
    /// empty stream.
    async fn max_version(&self, stream_id: Uuid) -> Result<Option<i64>, Error>;

    /// Returns the stream's events in ascending version order.
    async fn events(&self, stream_id: Uuid) -> Result<Vec<StoredEvent>, Error>;

    /// Returns the stream's events with version >= `from_version`, in
    /// ascending version order.
    async fn events_from(
        &self,
        stream_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, Error>;

    /// Returns a page of all events across streams, ordered by
    /// `(occurred_at, version)` ascending. Arguments are validated by the
    /// event store before this is called.
    async fn all_events(&self, offset: i64, limit: i64) -> Result<Vec<StoredEvent>, Error>;

    /// Returns all events across streams with version >= `from_version`,
    /// ordered by `(occurred_at, version)` ascending.
    async fn all_events_from(&self, from_version: i64) -> Result<Vec<StoredEvent>, Error>;
}
