//! Test snapshot repositories — in-memory and always-failing
//! `SnapshotRepository` implementations.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use everstream_core::error::Error;
use everstream_core::snapshot::{SnapshotRecord, SnapshotRepository};
use uuid::Uuid;

/// An in-memory snapshot store holding at most one record per
/// (aggregate id, aggregate type).
#[derive(Debug, Default)]
pub struct InMemorySnapshotRepository {
    records: Mutex<HashMap<(Uuid, String), SnapshotRecord>>,
}

impl InMemorySnapshotRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored snapshots.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn snapshot_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    /// Returns the stored snapshot version for the key, if any.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn latest_version(&self, aggregate_id: Uuid, aggregate_type: &str) -> Option<i64> {
        self.records
            .lock()
            .unwrap()
            .get(&(aggregate_id, aggregate_type.to_owned()))
            .map(|record| record.version)
    }
}

#[async_trait]
impl SnapshotRepository for InMemorySnapshotRepository {
    async fn upsert(&self, record: SnapshotRecord) -> Result<(), Error> {
        self.records
            .lock()
            .unwrap()
            .insert((record.aggregate_id, record.aggregate_type.clone()), record);
        Ok(())
    }

    async fn find_latest(
        &self,
        aggregate_id: Uuid,
        aggregate_type: &str,
    ) -> Result<Option<SnapshotRecord>, Error> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&(aggregate_id, aggregate_type.to_owned()))
            .cloned())
    }

    async fn delete_all(&self, aggregate_id: Uuid, aggregate_type: &str) -> Result<(), Error> {
        self.records
            .lock()
            .unwrap()
            .remove(&(aggregate_id, aggregate_type.to_owned()));
        Ok(())
    }
}

/// A snapshot repository that always fails. Useful for verifying that
/// snapshot failures never fail the write path.
#[derive(Debug, Default)]
pub struct FailingSnapshotRepository;

#[async_trait]
impl SnapshotRepository for FailingSnapshotRepository {
    async fn upsert(&self, _record: SnapshotRecord) -> Result<(), Error> {
        Err(Error::Store("connection refused".into()))
    }

    async fn find_latest(
        &self,
        _aggregate_id: Uuid,
        _aggregate_type: &str,
    ) -> Result<Option<SnapshotRecord>, Error> {
        Err(Error::Store("connection refused".into()))
    }

    async fn delete_all(&self, _aggregate_id: Uuid, _aggregate_type: &str) -> Result<(), Error> {
        Err(Error::Store("connection refused".into()))
    }
}
