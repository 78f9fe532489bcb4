//! Test event logs — in-memory and always-failing `EventLog`
//! implementations.

use std::sync::Mutex;

use async_trait::async_trait;
use everstream_core::error::Error;
use everstream_core::log::{EventLog, StoredEvent};
use uuid::Uuid;

/// An in-memory durable log with the same contract as a real one: atomic
/// batch appends, a uniqueness constraint on `(stream_id, version)`, and
/// global reads ordered by `(occurred_at, version)`.
#[derive(Debug, Default)]
pub struct InMemoryEventLog {
    events: Mutex<Vec<StoredEvent>>,
}

impl InMemoryEventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of stored events across all streams.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    fn globally_ordered(events: &[StoredEvent]) -> Vec<StoredEvent> {
        let mut ordered: Vec<StoredEvent> = events.to_vec();
        ordered.sort_by(|a, b| {
            a.occurred_at
                .cmp(&b.occurred_at)
                .then(a.version.cmp(&b.version))
        });
        ordered
    }
}

#[async_trait]
impl EventLog for InMemoryEventLog {
    async fn append(&self, events: &[StoredEvent]) -> Result<(), Error> {
        let mut stored = self.events.lock().unwrap();

        // Enforce the uniqueness constraint before mutating anything so the
        // batch stays atomic.
        let mut keys: std::collections::HashSet<(Uuid, i64)> =
            stored.iter().map(|e| (e.stream_id, e.version)).collect();
        for event in events {
            if !keys.insert((event.stream_id, event.version)) {
                return Err(Error::Store(format!(
                    "unique constraint violation on (stream_id, version): ({}, {})",
                    event.stream_id, event.version
                )));
            }
        }

        stored.extend(events.iter().cloned());
        Ok(())
    }

    async fn max_version(&self, stream_id: Uuid) -> Result<Option<i64>, Error> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.stream_id == stream_id)
            .map(|e| e.version)
            .max())
    }

    async fn events(&self, stream_id: Uuid) -> Result<Vec<StoredEvent>, Error> {
        let mut events: Vec<StoredEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.stream_id == stream_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn events_from(
        &self,
        stream_id: Uuid,
        from_version: i64,
    ) -> Result<Vec<StoredEvent>, Error> {
        let mut events: Vec<StoredEvent> = self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.stream_id == stream_id && e.version >= from_version)
            .cloned()
            .collect();
        events.sort_by_key(|e| e.version);
        Ok(events)
    }

    async fn all_events(&self, offset: i64, limit: i64) -> Result<Vec<StoredEvent>, Error> {
        let offset = usize::try_from(offset)
            .map_err(|_| Error::InvalidArgument(format!("offset cannot be negative, got {offset}")))?;
        let limit = usize::try_from(limit)
            .map_err(|_| Error::InvalidArgument(format!("limit must be positive, got {limit}")))?;

        let stored = self.events.lock().unwrap();
        Ok(Self::globally_ordered(&stored)
            .into_iter()
            .skip(offset)
            .take(limit)
            .collect())
    }

    async fn all_events_from(&self, from_version: i64) -> Result<Vec<StoredEvent>, Error> {
        let stored = self.events.lock().unwrap();
        Ok(Self::globally_ordered(&stored)
            .into_iter()
            .filter(|e| e.version >= from_version)
            .collect())
    }
}

/// An event log that always returns a store error. Useful for testing
/// error-handling paths.
#[derive(Debug, Default)]
pub struct FailingEventLog;

impl FailingEventLog {
    fn refused<T>() -> Result<T, Error> {
        Err(Error::Store("connection refused".into()))
    }
}

#[async_trait]
impl EventLog for FailingEventLog {
    async fn append(&self, _events: &[StoredEvent]) -> Result<(), Error> {
        Self::refused()
    }

    async fn max_version(&self, _stream_id: Uuid) -> Result<Option<i64>, Error> {
        Self::refused()
    }

    async fn events(&self, _stream_id: Uuid) -> Result<Vec<StoredEvent>, Error> {
        Self::refused()
    }

    async fn events_from(
        &self,
        _stream_id: Uuid,
        _from_version: i64,
    ) -> Result<Vec<StoredEvent>, Error> {
        Self::refused()
    }

    async fn all_events(&self, _offset: i64, _limit: i64) -> Result<Vec<StoredEvent>, Error> {
        Self::refused()
    }

    async fn all_events_from(&self, _from_version: i64) -> Result<Vec<StoredEvent>, Error> {
        Self::refused()
    }
}
