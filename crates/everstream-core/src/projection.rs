//! Projection abstraction and the projection manager.
//!
//! The manager orchestrates full rebuilds and incremental catch-up of all
//! registered projections from the event store. Projections have no
//! ordering dependency on each other, only on their own event sequence, so
//! both algorithms process every projection independently and in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinSet;

use crate::config::EngineConfig;
use crate::error::Error;
use crate::log::StoredEvent;
use crate::store::EventStore;

/// A derived, queryable read model built by folding events.
#[async_trait]
pub trait Projection: Send + Sync {
    /// Stable projection name, used to key the catch-up low-water mark.
    fn projection_name(&self) -> &'static str;

    /// Applies one event to the read model. Implementations must silently
    /// ignore event types that are not relevant to them and must catch and
    /// log their own handling failures: one bad event cannot halt the
    /// whole fan-out.
    async fn handle(&self, event: &StoredEvent);

    /// Clears the projection's durable store and any caches.
    async fn reset(&self) -> Result<(), Error>;
}

/// Orchestrates rebuild and catch-up across all registered projections.
pub struct ProjectionManager {
    store: EventStore,
    projections: Vec<Arc<dyn Projection>>,
    last_processed_versions: Arc<Mutex<HashMap<&'static str, i64>>>,
    batch_size: i64,
}

impl ProjectionManager {
    /// Creates a manager over the given projections.
    #[must_use]
    pub fn new(
        store: EventStore,
        projections: Vec<Arc<dyn Projection>>,
        config: &EngineConfig,
    ) -> Self {
        Self {
            store,
            projections,
            last_processed_versions: Arc::new(Mutex::new(HashMap::new())),
            batch_size: config.rebuild_batch_size(),
        }
    }

    /// Fully rebuilds every registered projection, independently and in
    /// parallel: reset, then page through the global event order applying
    /// each batch, recording the last applied version.
    ///
    /// Each projection's rebuild runs to its own completion or failure;
    /// one projection's failure never corrupts the others.
    ///
    /// # Errors
    ///
    /// Returns the first [`Error::ProjectionRebuild`] encountered, after
    /// all rebuilds have finished.
    pub async fn rebuild_all_projections(&self) -> Result<(), Error> {
        tracing::info!(count = self.projections.len(), "rebuilding all projections");

        let mut tasks = JoinSet::new();
        for projection in &self.projections {
            let projection = Arc::clone(projection);
            let store = self.store.clone();
            let marks = Arc::clone(&self.last_processed_versions);
            let batch_size = self.batch_size;
            tasks.spawn(async move {
                rebuild_projection(&store, projection.as_ref(), &marks, batch_size).await
            });
        }

        let mut first_error = None;
        while let Some(joined) = tasks.join_next().await {
            let result = joined.unwrap_or_else(|join_error| {
                Err(Error::ProjectionRebuild {
                    projection: "unknown".into(),
                    message: format!("rebuild task failed: {join_error}"),
                })
            });
            if let Err(error) = result {
                tracing::error!(%error, "projection rebuild failed");
                first_error.get_or_insert(error);
            }
        }

        match first_error {
            None => {
                tracing::info!("all projections rebuilt");
                Ok(())
            }
            Some(error) => Err(error),
        }
    }

    /// Incrementally applies new events to every registered projection, in
    /// parallel, using each projection's last-applied version as the
    /// low-water mark. A no-op when there are no new events; repeated
    /// invocation is idempotent.
    pub async fn process_new_events(&self) {
        let mut tasks = JoinSet::new();
        for projection in &self.projections {
            let projection = Arc::clone(projection);
            let store = self.store.clone();
            let marks = Arc::clone(&self.last_processed_versions);
            tasks
                .spawn(async move { catch_up_projection(&store, projection.as_ref(), &marks).await });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(join_error) = joined {
                tracing::error!(%join_error, "projection catch-up task failed");
            }
        }
    }

    /// Returns the last event version applied to the named projection, if
    /// it has processed any events.
    pub async fn last_processed_version(&self, projection_name: &str) -> Option<i64> {
        self.last_processed_versions
            .lock()
            .await
            .get(projection_name)
            .copied()
    }
}

/// Rebuilds one projection from scratch, paging through the global event
/// order until a short page signals the end.
async fn rebuild_projection(
    store: &EventStore,
    projection: &dyn Projection,
    marks: &Mutex<HashMap<&'static str, i64>>,
    batch_size: i64,
) -> Result<(), Error> {
    let name = projection.projection_name();
    tracing::info!(projection = name, "rebuilding projection");

    let wrap = |message: String| Error::ProjectionRebuild {
        projection: name.to_owned(),
        message,
    };

    projection.reset().await.map_err(|e| wrap(e.to_string()))?;

    let mut offset = 0_i64;
    let mut last_version = 0_i64;
    let mut total = 0_usize;
    loop {
        let page = store
            .get_all_events(offset, batch_size)
            .await
            .map_err(|e| wrap(e.to_string()))?;

        for event in &page {
            projection.handle(event).await;
            last_version = last_version.max(event.version);
        }

        total += page.len();
        let fetched = i64::try_from(page.len()).map_err(|e| wrap(e.to_string()))?;
        offset += fetched;
        if fetched < batch_size {
            break;
        }
    }

    marks.lock().await.insert(name, last_version);
    tracing::info!(projection = name, events = total, "rebuilt projection");
    Ok(())
}

/// Applies events newer than the projection's low-water mark. Failures are
/// logged and left for the next invocation; the mark makes the operation
/// resumable.
async fn catch_up_projection(
    store: &EventStore,
    projection: &dyn Projection,
    marks: &Mutex<HashMap<&'static str, i64>>,
) {
    let name = projection.projection_name();
    let mark = marks.lock().await.get(name).copied().unwrap_or(0);

    let events = match store.get_all_events_from(mark + 1).await {
        Ok(events) => events,
        Err(error) => {
            tracing::error!(projection = name, %error, "failed to load new events");
            return;
        }
    };

    if events.is_empty() {
        return;
    }

    let mut last_applied = mark;
    let mut applied = 0_usize;
    for event in &events {
        // Guard against page-boundary off-by-one: only apply events
        // strictly above the low-water mark.
        if event.version <= mark {
            continue;
        }
        projection.handle(event).await;
        last_applied = last_applied.max(event.version);
        applied += 1;
    }

    if applied > 0 {
        marks.lock().await.insert(name, last_applied);
        tracing::debug!(projection = name, events = applied, "processed new events");
    }
}
