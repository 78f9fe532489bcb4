//! Commands for the Order context.

use uuid::Uuid;

/// Command to create a new order.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The order identifier.
    pub order_id: Uuid,
    /// The customer the order belongs to.
    pub customer_id: Uuid,
}

/// Command to add an item to an order.
#[derive(Debug, Clone)]
pub struct AddOrderItem {
    /// The correlation ID for tracing.
    pub correlation_id: Uuid,
    /// The order identifier.
    pub order_id: Uuid,
    /// The product being ordered.
    pub product_id: Uuid,
    /// Display name of the product.
    pub product_name: String,
    /// Number of units ordered.
    pub quantity: u32,
    /// Unit price in minor currency units.
    pub price_cents: i64,
}
