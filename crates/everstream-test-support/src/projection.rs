//! Test projections — recording and failing `Projection` implementations
//! for projection-manager tests.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use everstream_core::error::Error;
use everstream_core::log::StoredEvent;
use everstream_core::projection::Projection;

/// A projection that records every event it handles.
#[derive(Debug)]
pub struct CountingProjection {
    name: &'static str,
    handled: Mutex<Vec<StoredEvent>>,
    resets: AtomicUsize,
}

impl CountingProjection {
    /// Creates a counting projection with the given name.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            handled: Mutex::new(Vec::new()),
            resets: AtomicUsize::new(0),
        }
    }

    /// Returns the number of events handled since the last reset.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn handled_count(&self) -> usize {
        self.handled.lock().unwrap().len()
    }

    /// Returns the versions of all handled events, in handling order.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn handled_versions(&self) -> Vec<i64> {
        self.handled.lock().unwrap().iter().map(|e| e.version).collect()
    }

    /// Returns how many times the projection has been reset.
    pub fn reset_count(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Projection for CountingProjection {
    fn projection_name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, event: &StoredEvent) {
        self.handled.lock().unwrap().push(event.clone());
    }

    async fn reset(&self) -> Result<(), Error> {
        self.resets.fetch_add(1, Ordering::SeqCst);
        self.handled.lock().unwrap().clear();
        Ok(())
    }
}

/// A projection whose reset always fails, for rebuild-isolation tests.
#[derive(Debug)]
pub struct FailingProjection {
    name: &'static str,
}

impl FailingProjection {
    /// Creates a failing projection with the given name.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl Projection for FailingProjection {
    fn projection_name(&self) -> &'static str {
        self.name
    }

    async fn handle(&self, _event: &StoredEvent) {}

    async fn reset(&self) -> Result<(), Error> {
        Err(Error::Store("projection store unavailable".into()))
    }
}
