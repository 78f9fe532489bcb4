//! Aggregate roots for the Order context.

use everstream_core::aggregate::AggregateRoot;
use everstream_core::clock::Clock;
use everstream_core::error::Error;
use everstream_core::event::EventMetadata;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::events::{
    ORDER_CREATED_EVENT_TYPE, ORDER_CREATED_SCHEMA_VERSION, ORDER_ITEM_ADDED_EVENT_TYPE,
    ORDER_ITEM_ADDED_SCHEMA_VERSION, OrderCreatedEvent, OrderEvent, OrderEventKind,
    OrderItemAddedEvent,
};

/// Lifecycle status of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Created, no items yet.
    Draft,
    /// At least one item added.
    Confirmed,
}

/// A line item on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
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

/// The aggregate root for an order.
///
/// State is serialized for snapshots; the uncommitted-event buffer is
/// transient and never part of a snapshot.
#[derive(Debug, Serialize, Deserialize)]
pub struct Order {
    id: Uuid,
    version: i64,
    customer_id: Option<Uuid>,
    status: OrderStatus,
    items: Vec<OrderItem>,
    total_cents: i64,
    #[serde(skip)]
    uncommitted_events: Vec<OrderEvent>,
}

impl Order {
    /// Creates an order aggregate, producing an `OrderCreated` event at
    /// version 1.
    #[must_use]
    pub fn create(
        id: Uuid,
        customer_id: Uuid,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Self {
        let mut order = <Self as AggregateRoot>::new(id);
        let event = OrderEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: ORDER_CREATED_EVENT_TYPE.to_owned(),
                stream_id: id,
                version: order.version + 1,
                schema_version: ORDER_CREATED_SCHEMA_VERSION,
                correlation_id,
                causation_id: None,
                occurred_at: clock.now(),
            },
            kind: OrderEventKind::OrderCreated(OrderCreatedEvent { customer_id }),
        };
        order.record(event);
        order
    }

    /// Adds an item to the order, producing an `OrderItemAdded` event.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if the order is not in `Draft`
    /// status.
    pub fn add_item(
        &mut self,
        product_id: Uuid,
        product_name: String,
        quantity: u32,
        price_cents: i64,
        correlation_id: Uuid,
        clock: &dyn Clock,
    ) -> Result<(), Error> {
        if self.status != OrderStatus::Draft {
            return Err(Error::InvalidArgument(format!(
                "cannot add items to order {} in status {:?}",
                self.id, self.status
            )));
        }

        let event = OrderEvent {
            metadata: EventMetadata {
                event_id: Uuid::new_v4(),
                event_type: ORDER_ITEM_ADDED_EVENT_TYPE.to_owned(),
                stream_id: self.id,
                version: self.version + 1,
                schema_version: ORDER_ITEM_ADDED_SCHEMA_VERSION,
                correlation_id,
                causation_id: None,
                occurred_at: clock.now(),
            },
            kind: OrderEventKind::OrderItemAdded(OrderItemAddedEvent {
                product_id,
                product_name,
                quantity,
                price_cents,
                discount_percent: None,
            }),
        };
        self.record(event);
        Ok(())
    }

    /// Applies the event to state and buffers it for persistence.
    fn record(&mut self, event: OrderEvent) {
        self.apply(&event);
        self.uncommitted_events.push(event);
    }

    /// The customer the order belongs to, once created.
    #[must_use]
    pub fn customer_id(&self) -> Option<Uuid> {
        self.customer_id
    }

    /// Current lifecycle status.
    #[must_use]
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    /// Line items in insertion order.
    #[must_use]
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Order total in minor currency units.
    #[must_use]
    pub fn total_cents(&self) -> i64 {
        self.total_cents
    }
}

impl AggregateRoot for Order {
    type Event = OrderEvent;

    const AGGREGATE_TYPE: &'static str = "Order";

    fn new(id: Uuid) -> Self {
        Self {
            id,
            version: 0,
            customer_id: None,
            status: OrderStatus::Draft,
            items: Vec::new(),
            total_cents: 0,
            uncommitted_events: Vec::new(),
        }
    }

    fn aggregate_id(&self) -> Uuid {
        self.id
    }

    fn version(&self) -> i64 {
        self.version
    }

    fn apply(&mut self, event: &Self::Event) {
        match &event.kind {
            OrderEventKind::OrderCreated(payload) => {
                self.customer_id = Some(payload.customer_id);
                self.status = OrderStatus::Draft;
            }
            OrderEventKind::OrderItemAdded(payload) => {
                let total_cents = payload.price_cents * i64::from(payload.quantity);
                self.items.push(OrderItem {
                    product_id: payload.product_id,
                    product_name: payload.product_name.clone(),
                    quantity: payload.quantity,
                    price_cents: payload.price_cents,
                    total_cents,
                });
                self.total_cents += total_cents;
                if self.status == OrderStatus::Draft {
                    self.status = OrderStatus::Confirmed;
                }
            }
        }
        self.version = event.metadata.version;
    }

    fn uncommitted_events(&self) -> &[Self::Event] {
        &self.uncommitted_events
    }

    fn clear_uncommitted_events(&mut self) {
        self.uncommitted_events.clear();
    }
}
