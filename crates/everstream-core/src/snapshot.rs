//! Snapshot subsystem: strategy, service, and the snapshot repository
//! abstraction.
//!
//! Snapshots are point-in-time serializations of an aggregate's full state,
//! keyed by (aggregate id, aggregate type). At most one snapshot row exists
//! per key; a new snapshot replaces the prior one. They are created after a
//! successful append when the strategy decides the accumulated version
//! delta warrants it, and consumed only at aggregate-load time.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::aggregate::AggregateRoot;
use crate::clock::Clock;
use crate::config::DEFAULT_SNAPSHOT_FREQUENCY;
use crate::error::Error;

/// Stored representation of an aggregate snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotRecord {
    /// The aggregate this snapshot belongs to.
    pub aggregate_id: Uuid,
    /// The aggregate type name (explicitly registered, not derived).
    pub aggregate_type: String,
    /// The stream version at which the snapshot was taken.
    pub version: i64,
    /// Serialized aggregate state.
    pub state: serde_json::Value,
    /// When the snapshot was taken.
    pub taken_at: DateTime<Utc>,
}

/// Abstract durable snapshot store: at most one row per
/// (aggregate id, aggregate type).
#[async_trait]
pub trait SnapshotRepository: Send + Sync {
    /// Stores `record`, replacing any prior snapshot for its key.
    async fn upsert(&self, record: SnapshotRecord) -> Result<(), Error>;

    /// Returns the snapshot for the key, if one exists.
    async fn find_latest(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
    ) -> Result<Option<SnapshotRecord>, Error>;

    /// Deletes the snapshot for the key, if one exists.
    async fn delete_all(&self, aggregate_id: Uuid, aggregate_type: &str) -> Result<(), Error>;
}

/// Pure decision function for when to snapshot an aggregate.
pub trait SnapshotStrategy: Send + Sync {
    /// Decides whether a snapshot should be created for an aggregate at
    /// `current_version`, given the version of its last snapshot, if any.
    fn should_create_snapshot(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
        current_version: i64,
        last_snapshot_version: Option<i64>,
    ) -> bool;

    /// The configured number of events between snapshots.
    fn snapshot_frequency(&self) -> i64;
}

/// Default strategy: snapshot every `frequency` events.
#[derive(Debug, Clone)]
pub struct DefaultSnapshotStrategy {
    frequency: i64,
}

impl DefaultSnapshotStrategy {
    /// Creates a strategy with the given frequency. A frequency of zero
    /// maps to the documented default
    /// ([`DEFAULT_SNAPSHOT_FREQUENCY`](crate::config::DEFAULT_SNAPSHOT_FREQUENCY)).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `frequency` is negative.
    pub fn new(frequency: i64) -> Result<Self, Error> {
        if frequency < 0 {
            return Err(Error::InvalidArgument(format!(
                "snapshot frequency cannot be negative, got {frequency}"
            )));
        }
        let frequency = if frequency == 0 {
            DEFAULT_SNAPSHOT_FREQUENCY
        } else {
            frequency
        };
        tracing::info!(frequency, "initialized default snapshot strategy");
        Ok(Self { frequency })
    }

    /// Creates a strategy from a validated engine configuration.
    #[must_use]
    pub fn from_config(config: &crate::config::EngineConfig) -> Self {
        Self {
            frequency: config.snapshot_frequency(),
        }
    }
}

impl SnapshotStrategy for DefaultSnapshotStrategy {
    fn should_create_snapshot(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
        current_version: i64,
        last_snapshot_version: Option<i64>,
    ) -> bool {
        let Some(last_version) = last_snapshot_version else {
            // First snapshot once the stream reaches the frequency threshold.
            return current_version >= self.frequency;
        };

        // Version regression, e.g. from a stream reset: the stored snapshot
        // no longer describes a reachable state.
        if current_version < last_version {
            tracing::warn!(
                %aggregate_id,
                aggregate_type,
                current_version,
                last_version,
                "current version is behind last snapshot version"
            );
            return true;
        }

        // Near the top of the version range the subtraction below could
        // never reach the threshold again.
        if current_version == i64::MAX || i64::MAX - current_version < self.frequency {
            tracing::debug!(%aggregate_id, "snapshotting due to version nearing i64::MAX");
            return true;
        }

        current_version - last_version >= self.frequency
    }

    fn snapshot_frequency(&self) -> i64 {
        self.frequency
    }
}

/// Service responsible for creating and restoring aggregate snapshots.
pub struct SnapshotService {
    repository: Arc<dyn SnapshotRepository>,
    strategy: Arc<dyn SnapshotStrategy>,
    clock: Arc<dyn Clock>,
}

impl SnapshotService {
    /// Creates a new snapshot service.
    #[must_use]
    pub fn new(
        repository: Arc<dyn SnapshotRepository>,
        strategy: Arc<dyn SnapshotStrategy>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            repository,
            strategy,
            clock,
        }
    }

    /// Creates a snapshot of the aggregate if the strategy determines one
    /// is needed. Returns whether a snapshot was created.
    ///
    /// Failures are caught and reported as `false` rather than propagated,
    /// so snapshotting never fails the caller's write path.
    pub async fn create_snapshot_if_needed<A>(&self, aggregate: &A) -> bool
    where
        A: AggregateRoot + Serialize + Sync,
    {
        match self.try_create_if_needed(aggregate).await {
            Ok(created) => created,
            Err(error) => {
                tracing::error!(
                    aggregate_id = %aggregate.aggregate_id(),
                    aggregate_type = A::AGGREGATE_TYPE,
                    %error,
                    "failed to create snapshot"
                );
                false
            }
        }
    }

    async fn try_create_if_needed<A>(&self, aggregate: &A) -> Result<bool, Error>
    where
        A: AggregateRoot + Serialize + Sync,
    {
        let aggregate_id = aggregate.aggregate_id();
        let last_snapshot_version = self
            .repository
            .find_latest(aggregate_id, A::AGGREGATE_TYPE)
            .await?
            .map(|record| record.version);

        if self.strategy.should_create_snapshot(
            aggregate_id,
            A::AGGREGATE_TYPE,
            aggregate.version(),
            last_snapshot_version,
        ) {
            self.create_snapshot(aggregate).await?;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    /// Unconditionally serializes the aggregate's current state and stores
    /// it, replacing the single snapshot row for its key.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotCreation`] on serialization or storage
    /// failure.
    pub async fn create_snapshot<A>(&self, aggregate: &A) -> Result<(), Error>
    where
        A: AggregateRoot + Serialize + Sync,
    {
        let aggregate_id = aggregate.aggregate_id();
        let version = aggregate.version();
        let state = serde_json::to_value(aggregate)
            .map_err(|e| Error::SnapshotCreation(format!("state serialization failed: {e}")))?;

        let record = SnapshotRecord {
            aggregate_id,
            aggregate_type: A::AGGREGATE_TYPE.to_owned(),
            version,
            state,
            taken_at: self.clock.now(),
        };

        self.repository
            .upsert(record)
            .await
            .map_err(|e| Error::SnapshotCreation(e.to_string()))?;

        tracing::info!(
            %aggregate_id,
            aggregate_type = A::AGGREGATE_TYPE,
            version,
            "created snapshot"
        );
        Ok(())
    }

    /// Restores an aggregate from its latest snapshot, returning the
    /// aggregate and the version at which the snapshot was taken, or
    /// `None` (not an error) if no snapshot exists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotRestoration`] on lookup or deserialization
    /// failure.
    pub async fn restore_from_latest_snapshot<A>(
        &self,
        aggregate_id: Uuid,
    ) -> Result<Option<(A, i64)>, Error>
    where
        A: AggregateRoot + DeserializeOwned,
    {
        let record = self
            .repository
            .find_latest(aggregate_id, A::AGGREGATE_TYPE)
            .await
            .map_err(|e| Error::SnapshotRestoration(e.to_string()))?;

        let Some(record) = record else {
            return Ok(None);
        };

        let aggregate: A = serde_json::from_value(record.state).map_err(|e| {
            Error::SnapshotRestoration(format!(
                "failed to deserialize snapshot for aggregate {aggregate_id}: {e}"
            ))
        })?;

        Ok(Some((aggregate, record.version)))
    }
}
