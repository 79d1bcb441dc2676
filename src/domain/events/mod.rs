//! Domain events
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "aggregate", content = "event", rename_all = "snake_case")]
pub enum DomainEvent {
    Cart(CartEvent),
    Order(OrderEvent),
}

impl DomainEvent {
    /// Subject the event is published under.
    pub fn subject(&self) -> String {
        let kind = match self {
            Self::Cart(CartEvent::ItemAdded { .. }) => "cart.item_added",
            Self::Cart(CartEvent::QuantityChanged { .. }) => "cart.quantity_changed",
            Self::Cart(CartEvent::ItemRemoved { .. }) => "cart.item_removed",
            Self::Cart(CartEvent::Cleared { .. }) => "cart.cleared",
            Self::Cart(CartEvent::Merged { .. }) => "cart.merged",
            Self::Order(OrderEvent::Placed { .. }) => "order.placed",
        };
        format!("storefront.{kind}")
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartEvent {
    ItemAdded { owner: String, product_id: String, quantity: u32 },
    QuantityChanged { owner: String, product_id: String, quantity: u32 },
    ItemRemoved { owner: String, product_id: String },
    Cleared { owner: String },
    Merged { from: String, into: String, lines: usize },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, owner: String, total: Decimal, item_count: u32 },
}
