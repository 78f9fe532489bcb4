//! Engine configuration.

use crate::error::Error;

/// Default number of events between snapshots.
pub const DEFAULT_SNAPSHOT_FREQUENCY: i64 = 100;
/// Default page size for full projection rebuilds.
pub const DEFAULT_REBUILD_BATCH_SIZE: i64 = 500;
/// Default projection cache capacity.
pub const DEFAULT_CACHE_CAPACITY: usize = 1000;
/// Default number of concurrently admitted store operations.
pub const DEFAULT_APPEND_CONCURRENCY_LIMIT: usize = 10_000;

/// Validated configuration surface for the engine. Constructed explicitly
/// and passed to the components that need it; there is no ambient
/// configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    snapshot_frequency: i64,
    rebuild_batch_size: i64,
    cache_capacity: usize,
    append_concurrency_limit: usize,
}

impl EngineConfig {
    /// Creates a configuration after validating every option.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if any option is not positive.
    pub fn new(
        snapshot_frequency: i64,
        rebuild_batch_size: i64,
        cache_capacity: usize,
        append_concurrency_limit: usize,
    ) -> Result<Self, Error> {
        if snapshot_frequency <= 0 {
            return Err(Error::InvalidArgument(format!(
                "snapshot frequency must be positive, got {snapshot_frequency}"
            )));
        }
        if rebuild_batch_size <= 0 {
            return Err(Error::InvalidArgument(format!(
                "rebuild batch size must be positive, got {rebuild_batch_size}"
            )));
        }
        if cache_capacity == 0 {
            return Err(Error::InvalidArgument(
                "cache capacity must be positive".into(),
            ));
        }
        if append_concurrency_limit == 0 {
            return Err(Error::InvalidArgument(
                "append concurrency limit must be positive".into(),
            ));
        }
        Ok(Self {
            snapshot_frequency,
            rebuild_batch_size,
            cache_capacity,
            append_concurrency_limit,
        })
    }

    /// Number of events between snapshots.
    #[must_use]
    pub fn snapshot_frequency(&self) -> i64 {
        self.snapshot_frequency
    }

    /// Page size used by full projection rebuilds.
    #[must_use]
    pub fn rebuild_batch_size(&self) -> i64 {
        self.rebuild_batch_size
    }

    /// Maximum number of entries in a projection cache.
    #[must_use]
    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }

    /// Maximum number of concurrently admitted store operations.
    #[must_use]
    pub fn append_concurrency_limit(&self) -> usize {
        self.append_concurrency_limit
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            snapshot_frequency: DEFAULT_SNAPSHOT_FREQUENCY,
            rebuild_batch_size: DEFAULT_REBUILD_BATCH_SIZE,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            append_concurrency_limit: DEFAULT_APPEND_CONCURRENCY_LIMIT,
        }
    }
}
