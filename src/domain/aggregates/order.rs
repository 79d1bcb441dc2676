//! Order Aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::value_objects::{CartIdentity, Money, ProductId};

#[derive(Clone, Debug)]
pub struct Order {
    id: Uuid,
    owner: CartIdentity,
    items: Vec<OrderItem>,
    total: Money,
    status: OrderStatus,
    created_at: DateTime<Utc>,
    events: Vec<DomainEvent>,
}

/// Snapshot of a cart line at checkout time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderItem { pub product_id: ProductId, pub name: String, pub image: String, pub unit_price: Money, pub quantity: u32 }

impl OrderItem {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus { #[default] Pending, Completed, Cancelled }

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "pending", Self::Completed => "completed", Self::Cancelled => "cancelled" }
    }
}

impl FromStr for OrderStatus {
    type Err = OrderError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "completed" => Ok(Self::Completed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(OrderError::UnknownStatus(other.to_string())),
        }
    }
}

impl Order {
    /// Creates a pending order from a priced cart snapshot.
    pub fn place(owner: CartIdentity, items: Vec<OrderItem>) -> Result<Self, OrderError> {
        if items.is_empty() { return Err(OrderError::NoItems); }
        let id = Uuid::now_v7();
        let total = items.iter().map(OrderItem::line_total).sum();
        let mut order = Self {
            id, owner, items, total, status: OrderStatus::Pending, created_at: Utc::now(), events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: id, owner: order.owner.storage_key(), total: order.total.amount(), item_count: order.item_count(),
        }));
        Ok(order)
    }

    pub fn restore(id: Uuid, owner: CartIdentity, items: Vec<OrderItem>, total: Money, status: OrderStatus, created_at: DateTime<Utc>) -> Self {
        Self { id, owner, items, total, status, created_at, events: vec![] }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn owner(&self) -> &CartIdentity { &self.owner }
    pub fn items(&self) -> &[OrderItem] { &self.items }
    pub fn total(&self) -> Money { self.total }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn item_count(&self) -> u32 { self.items.iter().map(|i| i.quantity).sum() }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    #[error("an order needs at least one item")]
    NoItems,
    #[error("unknown order status {0:?}")]
    UnknownStatus(String),
}
