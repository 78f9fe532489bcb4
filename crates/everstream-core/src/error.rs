//! Engine error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level error type for the event-sourcing engine.
#[derive(Debug, Error)]
pub enum Error {
    /// An event failed schema validation or evolution. Not retryable
    /// without a fix to the writer.
    #[error("schema error: {0}")]
    Schema(String),

    /// Optimistic concurrency conflict: the stream moved past the version
    /// the caller observed. Retryable by reloading and recomputing the
    /// command.
    #[error("concurrency conflict on stream {stream_id}: expected version {expected}, found {actual}")]
    Concurrency {
        /// The stream that had the conflict.
        stream_id: Uuid,
        /// The version the caller expected.
        expected: i64,
        /// The version actually found in the store.
        actual: i64,
    },

    /// An aggregate has no events and no snapshot.
    #[error("aggregate not found: {0}")]
    AggregateNotFound(Uuid),

    /// An underlying durable-storage failure, including timeouts.
    /// Retryable at caller discretion.
    #[error("store error: {0}")]
    Store(String),

    /// Snapshot serialization or persistence failed.
    #[error("snapshot creation failed: {0}")]
    SnapshotCreation(String),

    /// Snapshot lookup or deserialization failed.
    #[error("snapshot restoration failed: {0}")]
    SnapshotRestoration(String),

    /// A full projection rebuild failed for one projection.
    #[error("projection rebuild failed for {projection}: {message}")]
    ProjectionRebuild {
        /// The projection that failed to rebuild.
        projection: String,
        /// The underlying failure.
        message: String,
    },

    /// A precondition violation such as a negative paging offset.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
