//! Domain event abstractions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Error;

/// Metadata attached to every domain event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type tag for serialization routing (struct name minus the `Event`
    /// suffix, e.g. `OrderCreated`).
    pub event_type: String,
    /// Stream (aggregate) this event belongs to.
    pub stream_id: Uuid,
    /// Monotonically increasing version within the stream, starting at 1.
    pub version: i64,
    /// Shape version of this instance's payload.
    pub schema_version: i32,
    /// Correlation ID tying together events from one causal chain.
    pub correlation_id: Uuid,
    /// The event, if any, that caused this one.
    pub causation_id: Option<Uuid>,
    /// Timestamp of event creation.
    pub occurred_at: DateTime<Utc>,
}

/// Trait that all domain events implement.
///
/// Concrete event types are closed tagged unions per aggregate: an envelope
/// carrying [`EventMetadata`] plus a kind enum, with an exhaustive match in
/// every handler. Each payload struct name must end in `Event`; the schema
/// registry derives the type tag from that name.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Returns the event type tag (used for serialization routing).
    fn event_type(&self) -> &'static str;

    /// Returns the declared struct name of this instance's payload,
    /// e.g. `OrderCreatedEvent`. The registry re-derives the type tag from
    /// this name and rejects events whose reported tag does not match.
    fn struct_name(&self) -> &'static str;

    /// Returns the metadata for this event.
    fn metadata(&self) -> &EventMetadata;

    /// Serializes the event payload to JSON. The encoding embeds the type
    /// tag so stored payloads are self-describing.
    fn to_payload(&self) -> serde_json::Value;

    /// Returns the shape version of this instance's payload.
    fn schema_version(&self) -> i32 {
        self.metadata().schema_version
    }

    /// Converts this event to `target_version`.
    ///
    /// Returns the event unchanged when it is already at the target
    /// version. When a mapping to the target shape is defined, returns a
    /// semantically-equivalent instance at that version, filling fields
    /// absent from the source shape with documented defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] when no mapping to `target_version`
    /// exists; never returns a best-guess value.
    fn evolve(&self, target_version: i32) -> Result<Self, Error>
    where
        Self: Sized;

    /// Non-throwing probe for [`evolve`](DomainEvent::evolve).
    fn can_evolve(&self, target_version: i32) -> bool
    where
        Self: Sized,
    {
        self.evolve(target_version).is_ok()
    }
}
