//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for aggregate roots that reconstitute from event history.
///
/// An aggregate is exclusively owned by the calling use-case during a
/// single command execution; the optimistic concurrency check at append
/// time is the second line of defense against concurrent commands racing
/// on one stream.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate produces and consumes.
    type Event: DomainEvent;

    /// Stable aggregate type name, used to key snapshots. This is an
    /// explicit registration, not derived from the Rust type name.
    const AGGREGATE_TYPE: &'static str;

    /// Creates a fresh, empty aggregate at version 0.
    fn new(id: Uuid) -> Self;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the current version: the version of the last applied event,
    /// or 0 for a fresh aggregate.
    fn version(&self) -> i64;

    /// Applies an event to mutate internal state and sets the aggregate
    /// version to the event's version. Used both during reconstitution and
    /// when recording new events; replaying events in ascending version
    /// order must be deterministic.
    fn apply(&mut self, event: &Self::Event);

    /// Returns uncommitted events produced by command handling.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Clears uncommitted events. Called only after a successful append.
    fn clear_uncommitted_events(&mut self);

    /// Replays stored history onto this aggregate, in the given order.
    fn load_from_history<'a, I>(&mut self, events: I)
    where
        I: IntoIterator<Item = &'a Self::Event>,
        Self::Event: 'a,
    {
        for event in events {
            self.apply(event);
        }
    }
}
