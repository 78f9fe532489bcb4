//! Order read-model projection with a concurrent read-through cache.
//!
//! The projection maintains a denormalized view per order, keyed by order
//! id with a secondary index by customer id. Both maps live in one
//! composite structure behind a single read/write lock, so they are always
//! mutated together and readers can never observe them out of step. The
//! durable projection store backs the cache on miss and receives every
//! mutation.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use everstream_core::config::EngineConfig;
use everstream_core::error::Error;
use everstream_core::log::StoredEvent;
use everstream_core::projection::Projection;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::domain::aggregates::OrderStatus;
use crate::domain::events::{
    ORDER_CREATED_EVENT_TYPE, ORDER_ITEM_ADDED_EVENT_TYPE, OrderEventKind,
};

/// A line item on the order read model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemProjection {
    /// The product ordered.
    pub product_id: Uuid,
    /// Display name of the product at order time.
    pub product_name: String,
    /// Number of units ordered.
    pub quantity: u32,
    /// Unit price in minor currency units.
    pub price_cents: i64,
    /// Line total in minor currency units.
    pub total_cents: i64,
}

/// Read-optimized denormalized view of one order.
///
/// Mutated only by the projection's event handlers; readers receive
/// clones, never live references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderProjectionModel {
    /// The order identifier.
    pub id: Uuid,
    /// The customer the order belongs to (secondary index key).
    pub customer_id: Uuid,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Line items in insertion order.
    pub items: Vec<OrderItemProjection>,
    /// Running order total in minor currency units.
    pub total_cents: i64,
    /// When the order was created.
    pub created_at: DateTime<Utc>,
    /// When the model was last updated.
    pub updated_at: DateTime<Utc>,
    /// Last applied event version, for idempotent re-application.
    pub version: i64,
}

/// Durable store backing the order projection: CRUD by order id plus a
/// query by the customer secondary key.
#[async_trait]
pub trait OrderProjectionStore: Send + Sync {
    /// Inserts or replaces the model.
    async fn save(&self, model: &OrderProjectionModel) -> Result<(), Error>;

    /// Returns the model for the order, if present.
    async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderProjectionModel>, Error>;

    /// Returns all models for the customer, newest first.
    async fn find_by_customer_id(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<OrderProjectionModel>, Error>;

    /// Returns all models, newest first.
    async fn find_all(&self) -> Result<Vec<OrderProjectionModel>, Error>;

    /// Deletes every model.
    async fn delete_all(&self) -> Result<(), Error>;
}

/// In-memory implementation of [`OrderProjectionStore`].
#[derive(Debug, Default)]
pub struct InMemoryOrderProjectionStore {
    rows: RwLock<HashMap<Uuid, OrderProjectionModel>>,
}

impl InMemoryOrderProjectionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn newest_first(mut models: Vec<OrderProjectionModel>) -> Vec<OrderProjectionModel> {
        models.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        models
    }
}

#[async_trait]
impl OrderProjectionStore for InMemoryOrderProjectionStore {
    async fn save(&self, model: &OrderProjectionModel) -> Result<(), Error> {
        self.rows.write().await.insert(model.id, model.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<OrderProjectionModel>, Error> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn find_by_customer_id(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<OrderProjectionModel>, Error> {
        let models: Vec<OrderProjectionModel> = self
            .rows
            .read()
            .await
            .values()
            .filter(|m| m.customer_id == customer_id)
            .cloned()
            .collect();
        Ok(Self::newest_first(models))
    }

    async fn find_all(&self) -> Result<Vec<OrderProjectionModel>, Error> {
        let models: Vec<OrderProjectionModel> =
            self.rows.read().await.values().cloned().collect();
        Ok(Self::newest_first(models))
    }

    async fn delete_all(&self) -> Result<(), Error> {
        self.rows.write().await.clear();
        Ok(())
    }
}

/// The two co-indexed cache maps, kept in one structure so every mutation
/// updates both under the same exclusive borrow.
#[derive(Debug, Default)]
struct OrderCache {
    by_id: HashMap<Uuid, OrderProjectionModel>,
    by_customer: HashMap<Uuid, Vec<OrderProjectionModel>>,
}

impl OrderCache {
    /// Inserts or replaces the model in the primary map and the customer
    /// index, removing any stale index entry for the same order first.
    fn insert(&mut self, model: OrderProjectionModel) {
        let customer_orders = self.by_customer.entry(model.customer_id).or_default();
        customer_orders.retain(|order| order.id != model.id);
        customer_orders.push(model.clone());
        self.by_id.insert(model.id, model);
    }

    fn remove(&mut self, id: Uuid, customer_id: Uuid) {
        self.by_id.remove(&id);
        if let Some(customer_orders) = self.by_customer.get_mut(&customer_id) {
            customer_orders.retain(|order| order.id != id);
            if customer_orders.is_empty() {
                self.by_customer.remove(&customer_id);
            }
        }
    }

    fn clear(&mut self) {
        self.by_id.clear();
        self.by_customer.clear();
    }

    /// Evicts the least-recently-updated entries down to `capacity`.
    fn evict_to_capacity(&mut self, capacity: usize) -> usize {
        if self.by_id.len() <= capacity {
            return 0;
        }
        let excess = self.by_id.len() - capacity;

        let mut entries: Vec<(Uuid, Uuid, DateTime<Utc>)> = self
            .by_id
            .values()
            .map(|m| (m.id, m.customer_id, m.updated_at))
            .collect();
        entries.sort_by(|a, b| a.2.cmp(&b.2).then(a.0.cmp(&b.0)));

        for (id, customer_id, _) in entries.into_iter().take(excess) {
            self.remove(id, customer_id);
        }
        excess
    }

    /// True when the customer index is exactly the grouping of the primary
    /// map by customer id, with no empty buckets.
    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        let mut grouped: HashMap<Uuid, Vec<Uuid>> = HashMap::new();
        for model in self.by_id.values() {
            grouped.entry(model.customer_id).or_default().push(model.id);
        }

        if grouped.len() != self.by_customer.len() {
            return false;
        }
        grouped.iter().all(|(customer_id, ids)| {
            self.by_customer.get(customer_id).is_some_and(|bucket| {
                let mut bucket_ids: Vec<Uuid> = bucket.iter().map(|m| m.id).collect();
                let mut ids = ids.clone();
                bucket_ids.sort();
                ids.sort();
                !bucket.is_empty() && bucket_ids == ids
            })
        })
    }
}

/// Order read-model projection with a bounded, concurrent read-through
/// cache.
pub struct OrderProjection {
    store: Arc<dyn OrderProjectionStore>,
    cache: RwLock<OrderCache>,
    capacity: usize,
}

impl OrderProjection {
    /// Creates a projection over the given durable store, with the cache
    /// capacity taken from `config`.
    #[must_use]
    pub fn new(store: Arc<dyn OrderProjectionStore>, config: &EngineConfig) -> Self {
        Self {
            store,
            cache: RwLock::new(OrderCache::default()),
            capacity: config.cache_capacity(),
        }
    }

    /// Returns the order read model, consulting the cache first and
    /// falling back to the durable store on miss.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] on a durable-store failure.
    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<OrderProjectionModel>, Error> {
        {
            let cache = self.cache.read().await;
            if let Some(model) = cache.by_id.get(&id) {
                tracing::debug!(%id, "cache hit for order");
                return Ok(Some(model.clone()));
            }
        }

        let model = self.store.find_by_id(id).await?;
        if let Some(model) = &model {
            self.update_cache(model.clone()).await;
        }
        Ok(model)
    }

    /// Returns all read models for the customer, consulting the secondary
    /// index first and falling back to the durable store on miss.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] on a durable-store failure.
    pub async fn get_by_customer_id(
        &self,
        customer_id: Uuid,
    ) -> Result<Vec<OrderProjectionModel>, Error> {
        {
            let cache = self.cache.read().await;
            if let Some(orders) = cache.by_customer.get(&customer_id) {
                tracing::debug!(%customer_id, "cache hit for customer orders");
                return Ok(orders.clone());
            }
        }

        let models = self.store.find_by_customer_id(customer_id).await?;
        if !models.is_empty() {
            let mut cache = self.cache.write().await;
            for model in &models {
                cache.insert(model.clone());
            }
            let evicted = cache.evict_to_capacity(self.capacity);
            if evicted > 0 {
                tracing::debug!(evicted, "evicted cache entries");
            }
        }
        Ok(models)
    }

    /// Returns every read model, from the cache when it is warm, otherwise
    /// from the durable store (repopulating the cache).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] on a durable-store failure.
    pub async fn get_all(&self) -> Result<Vec<OrderProjectionModel>, Error> {
        {
            let cache = self.cache.read().await;
            if !cache.by_id.is_empty() {
                return Ok(cache.by_id.values().cloned().collect());
            }
        }

        let models = self.store.find_all().await?;
        if !models.is_empty() {
            let mut cache = self.cache.write().await;
            cache.clear();
            for model in &models {
                cache.insert(model.clone());
            }
            cache.evict_to_capacity(self.capacity);
        }
        Ok(models)
    }

    async fn update_cache(&self, model: OrderProjectionModel) {
        let mut cache = self.cache.write().await;
        cache.insert(model);
        let evicted = cache.evict_to_capacity(self.capacity);
        if evicted > 0 {
            tracing::debug!(evicted, size = cache.by_id.len(), "evicted cache entries");
        }
    }

    async fn apply_event(&self, event: &StoredEvent) -> Result<(), Error> {
        let kind: OrderEventKind = serde_json::from_value(event.payload.clone()).map_err(|e| {
            Error::Schema(format!(
                "failed to decode {} payload for event {}: {e}",
                event.event_type, event.event_id
            ))
        })?;

        match kind {
            OrderEventKind::OrderCreated(payload) => {
                let model = OrderProjectionModel {
                    id: event.stream_id,
                    customer_id: payload.customer_id,
                    status: OrderStatus::Draft,
                    items: Vec::new(),
                    total_cents: 0,
                    created_at: event.occurred_at,
                    updated_at: event.occurred_at,
                    version: event.version,
                };
                self.store.save(&model).await?;
                self.update_cache(model).await;
                tracing::debug!(order_id = %event.stream_id, "order projection created");
            }
            OrderEventKind::OrderItemAdded(payload) => {
                let Some(mut model) = self.get_by_id(event.stream_id).await? else {
                    tracing::warn!(
                        order_id = %event.stream_id,
                        "order not found for item-added event"
                    );
                    return Ok(());
                };

                let total_cents = payload.price_cents * i64::from(payload.quantity);
                model.items.push(OrderItemProjection {
                    product_id: payload.product_id,
                    product_name: payload.product_name,
                    quantity: payload.quantity,
                    price_cents: payload.price_cents,
                    total_cents,
                });
                model.total_cents += total_cents;
                model.updated_at = event.occurred_at;
                model.version = event.version;
                if model.status == OrderStatus::Draft {
                    model.status = OrderStatus::Confirmed;
                }

                self.store.save(&model).await?;
                self.update_cache(model).await;
                tracing::debug!(order_id = %event.stream_id, "order item added to projection");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Projection for OrderProjection {
    fn projection_name(&self) -> &'static str {
        "OrderProjection"
    }

    async fn handle(&self, event: &StoredEvent) {
        let result = match event.event_type.as_str() {
            ORDER_CREATED_EVENT_TYPE | ORDER_ITEM_ADDED_EVENT_TYPE => {
                self.apply_event(event).await
            }
            other => {
                tracing::debug!(event_type = other, "ignoring event type");
                Ok(())
            }
        };

        if let Err(error) = result {
            tracing::error!(
                event_type = %event.event_type,
                order_id = %event.stream_id,
                %error,
                "error handling event"
            );
        }
    }

    async fn reset(&self) -> Result<(), Error> {
        // Hold the write lock across the store wipe so readers see the
        // reset atomically.
        let mut cache = self.cache.write().await;
        self.store.delete_all().await?;
        cache.clear();
        tracing::info!("order projection reset");
        Ok(())
    }
}
