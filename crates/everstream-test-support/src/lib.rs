//! Shared test mocks and utilities for the Everstream engine.

mod clock;
mod log;
mod projection;
mod snapshot;

pub use clock::FixedClock;
pub use log::{FailingEventLog, InMemoryEventLog};
pub use projection::{CountingProjection, FailingProjection};
pub use snapshot::{FailingSnapshotRepository, InMemorySnapshotRepository};
