//! Query handlers for the Order context.
//!
//! Reconstitute the aggregate from stored events (via snapshot plus tail
//! replay when available) and return read-only view DTOs.

use everstream_core::error::Error;
use everstream_core::store::EventStore;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::aggregates::{Order, OrderItem, OrderStatus};

/// Read-only view of an order aggregate.
#[derive(Debug, Serialize)]
pub struct OrderView {
    /// The order identifier.
    pub order_id: Uuid,
    /// The customer the order belongs to.
    pub customer_id: Option<Uuid>,
    /// Current lifecycle status.
    pub status: OrderStatus,
    /// Line items in insertion order.
    pub items: Vec<OrderItem>,
    /// Order total in minor currency units.
    pub total_cents: i64,
    /// Current version (last applied event).
    pub version: i64,
}

/// Retrieves an order by its aggregate ID.
///
/// # Errors
///
/// Returns [`Error::AggregateNotFound`] if the order has neither events
/// nor a snapshot, and any read-path error from the event store.
pub async fn get_order_by_id(order_id: Uuid, store: &EventStore) -> Result<OrderView, Error> {
    use everstream_core::aggregate::AggregateRoot;

    let order: Order = store
        .load_aggregate(order_id)
        .await?
        .ok_or(Error::AggregateNotFound(order_id))?;

    Ok(OrderView {
        order_id,
        customer_id: order.customer_id(),
        status: order.status(),
        items: order.items().to_vec(),
        total_cents: order.total_cents(),
        version: order.version(),
    })
}
