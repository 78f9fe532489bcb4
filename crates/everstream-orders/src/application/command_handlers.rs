//! Command handlers for the Order context.
//!
//! This module contains application-level command handler functions that
//! orchestrate domain logic: load aggregate, execute command, commit events.

use everstream_core::clock::Clock;
use everstream_core::error::Error;
use everstream_core::store::EventStore;

use crate::domain::aggregates::Order;
use crate::domain::commands::{AddOrderItem, CreateOrder};

/// Handles the `CreateOrder` command: creates a fresh aggregate and commits
/// the resulting event with expected version 0.
///
/// # Errors
///
/// Returns [`Error::Concurrency`] if the order stream already has events,
/// and any append-path error from the event store.
pub async fn handle_create_order(
    command: &CreateOrder,
    clock: &dyn Clock,
    store: &EventStore,
) -> Result<(), Error> {
    let mut order = Order::create(
        command.order_id,
        command.customer_id,
        command.correlation_id,
        clock,
    );
    store.commit(&mut order).await
}

/// Handles the `AddOrderItem` command: loads the aggregate (snapshot plus
/// tail replay when available), adds the item, and commits the resulting
/// event.
///
/// # Errors
///
/// Returns [`Error::InvalidArgument`] for an empty product name, a zero
/// quantity, or a negative price; [`Error::AggregateNotFound`] if the order
/// does not exist; and any append-path error from the event store.
pub async fn handle_add_order_item(
    command: &AddOrderItem,
    clock: &dyn Clock,
    store: &EventStore,
) -> Result<(), Error> {
    if command.product_name.trim().is_empty() {
        return Err(Error::InvalidArgument(
            "product name must not be empty".into(),
        ));
    }
    if command.quantity == 0 {
        return Err(Error::InvalidArgument(
            "quantity must be greater than zero".into(),
        ));
    }
    if command.price_cents < 0 {
        return Err(Error::InvalidArgument(
            "price must not be negative".into(),
        ));
    }

    let mut order: Order = store
        .load_aggregate(command.order_id)
        .await?
        .ok_or(Error::AggregateNotFound(command.order_id))?;

    order.add_item(
        command.product_id,
        command.product_name.clone(),
        command.quantity,
        command.price_cents,
        command.correlation_id,
        clock,
    )?;

    store.commit(&mut order).await
}
