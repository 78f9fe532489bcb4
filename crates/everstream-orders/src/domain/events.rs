//! Domain events for the Order context.

use everstream_core::error::Error;
use everstream_core::event::{DomainEvent, EventMetadata};
use everstream_core::log::StoredEvent;
use everstream_core::schema::{EventTypeDescriptor, SchemaRegistry};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type tag for order creation events.
pub const ORDER_CREATED_EVENT_TYPE: &str = "OrderCreated";
/// Type tag for order item addition events.
pub const ORDER_ITEM_ADDED_EVENT_TYPE: &str = "OrderItemAdded";

/// Current schema version of [`OrderCreatedEvent`].
pub const ORDER_CREATED_SCHEMA_VERSION: i32 = 1;
/// Current schema version of [`OrderItemAddedEvent`]. Version 1 carried a
/// per-item `discount_percent` that version 2 removed.
pub const ORDER_ITEM_ADDED_SCHEMA_VERSION: i32 = 2;

const ORDER_CREATED_STRUCT_NAME: &str = "OrderCreatedEvent";
const ORDER_ITEM_ADDED_STRUCT_NAME: &str = "OrderItemAddedEvent";

/// Emitted when an order is created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreatedEvent {
    /// The customer the order belongs to.
    pub customer_id: Uuid,
}

/// Emitted when an item is added to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemAddedEvent {
    /// The product being ordered.
    pub product_id: Uuid,
    /// Display name of the product at order time.
    pub product_name: String,
    /// Number of units ordered.
    pub quantity: u32,
    /// Unit price in minor currency units.
    pub price_cents: i64,
    /// Per-item discount percentage; present only in the version 1 shape.
    /// The documented default when downgrading from version 2 is 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discount_percent: Option<i32>,
}

/// Event payload variants for the Order context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderEventKind {
    /// An order has been created.
    OrderCreated(OrderCreatedEvent),
    /// An item has been added to an order.
    OrderItemAdded(OrderItemAddedEvent),
}

/// Domain event envelope for the Order context.
#[derive(Debug, Clone)]
pub struct OrderEvent {
    /// Event metadata.
    pub metadata: EventMetadata,
    /// Event-specific payload.
    pub kind: OrderEventKind,
}

impl DomainEvent for OrderEvent {
    fn event_type(&self) -> &'static str {
        match &self.kind {
            OrderEventKind::OrderCreated(_) => ORDER_CREATED_EVENT_TYPE,
            OrderEventKind::OrderItemAdded(_) => ORDER_ITEM_ADDED_EVENT_TYPE,
        }
    }

    fn struct_name(&self) -> &'static str {
        match &self.kind {
            OrderEventKind::OrderCreated(_) => ORDER_CREATED_STRUCT_NAME,
            OrderEventKind::OrderItemAdded(_) => ORDER_ITEM_ADDED_STRUCT_NAME,
        }
    }

    fn metadata(&self) -> &EventMetadata {
        &self.metadata
    }

    fn to_payload(&self) -> serde_json::Value {
        // Serialization of derived Serialize types to Value is infallible.
        serde_json::to_value(&self.kind).expect("OrderEventKind serialization is infallible")
    }

    fn evolve(&self, target_version: i32) -> Result<Self, Error> {
        let current = self.metadata.schema_version;
        if target_version == current {
            return Ok(self.clone());
        }

        match &self.kind {
            OrderEventKind::OrderCreated(_) => Err(Error::Schema(format!(
                "no schema mapping for {ORDER_CREATED_EVENT_TYPE} from version {current} to {target_version}"
            ))),
            OrderEventKind::OrderItemAdded(payload) => match (current, target_version) {
                (2, 1) => {
                    // The version 1 shape carries the discount field; fill
                    // it with the documented default.
                    let mut payload = payload.clone();
                    payload.discount_percent = Some(0);
                    Ok(Self {
                        metadata: EventMetadata {
                            schema_version: 1,
                            ..self.metadata.clone()
                        },
                        kind: OrderEventKind::OrderItemAdded(payload),
                    })
                }
                (1, 2) => {
                    let mut payload = payload.clone();
                    payload.discount_percent = None;
                    Ok(Self {
                        metadata: EventMetadata {
                            schema_version: 2,
                            ..self.metadata.clone()
                        },
                        kind: OrderEventKind::OrderItemAdded(payload),
                    })
                }
                _ => Err(Error::Schema(format!(
                    "no schema mapping for {ORDER_ITEM_ADDED_EVENT_TYPE} from version {current} to {target_version}"
                ))),
            },
        }
    }
}

impl TryFrom<&StoredEvent> for OrderEvent {
    type Error = Error;

    fn try_from(stored: &StoredEvent) -> Result<Self, Error> {
        let kind: OrderEventKind = serde_json::from_value(stored.payload.clone()).map_err(|e| {
            Error::Schema(format!(
                "failed to decode {} payload for event {}: {e}",
                stored.event_type, stored.event_id
            ))
        })?;
        Ok(Self {
            metadata: EventMetadata {
                event_id: stored.event_id,
                event_type: stored.event_type.clone(),
                stream_id: stored.stream_id,
                version: stored.version,
                schema_version: stored.schema_version,
                correlation_id: stored.correlation_id,
                causation_id: stored.causation_id,
                occurred_at: stored.occurred_at,
            },
            kind,
        })
    }
}

/// Registers every Order event type with the schema registry. Called once
/// at startup.
///
/// # Errors
///
/// Returns [`Error::Schema`] if a declaration violates the registry's
/// naming or versioning rules.
pub fn register_order_event_types(registry: &mut SchemaRegistry) -> Result<(), Error> {
    registry.register_event_type(&EventTypeDescriptor {
        struct_name: ORDER_CREATED_STRUCT_NAME,
        schema_version: ORDER_CREATED_SCHEMA_VERSION,
    })?;
    registry.register_event_type(&EventTypeDescriptor {
        struct_name: ORDER_ITEM_ADDED_STRUCT_NAME,
        schema_version: ORDER_ITEM_ADDED_SCHEMA_VERSION,
    })?;
    Ok(())
}
