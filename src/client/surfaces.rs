//! Read-only views over the cart store for the header badge and cart page.

use tokio::sync::watch;

use super::store::{CartSnapshot, LoadState};
use crate::domain::value_objects::MAX_QUANTITY_PER_REQUEST;

/// Item count shown next to the cart link.
pub struct HeaderBadge {
    rx: watch::Receiver<CartSnapshot>,
}

impl HeaderBadge {
    pub fn new(rx: watch::Receiver<CartSnapshot>) -> Self { Self { rx } }

    pub fn count(&self) -> u32 { self.rx.borrow().item_count() }

    /// `None` hides the badge.
    pub fn label(&self) -> Option<String> {
        match self.count() {
            0 => None,
            n if n > 99 => Some("99+".to_string()),
            n => Some(n.to_string()),
        }
    }

    /// Waits for the next store update. `None` once the store is gone.
    pub async fn changed(&mut self) -> Option<u32> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().item_count())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartPageRow {
    pub product_id: String,
    pub name: String,
    pub subtitle: String,
    pub image: String,
    pub quantity: u32,
    pub unit_price: String,
    pub line_total: String,
    pub can_decrement: bool,
    pub can_increment: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartPage {
    pub rows: Vec<CartPageRow>,
    pub subtotal: String,
    pub item_count: u32,
    pub loading: bool,
}

impl CartPage {
    pub fn from_snapshot(snapshot: &CartSnapshot) -> Self {
        let rows = snapshot
            .cart
            .items
            .iter()
            .map(|item| CartPageRow {
                product_id: item.product_id.clone(),
                name: item.name.clone(),
                subtitle: item.subtitle.clone(),
                image: item.image.clone(),
                quantity: item.quantity,
                unit_price: item.unit_price.to_string(),
                line_total: item.line_total.to_string(),
                can_decrement: item.quantity > 1,
                can_increment: item.quantity < MAX_QUANTITY_PER_REQUEST,
            })
            .collect();
        Self {
            rows,
            subtotal: snapshot.cart.subtotal.to_string(),
            item_count: snapshot.cart.item_count,
            loading: snapshot.state == LoadState::Loading,
        }
    }

    pub fn is_empty(&self) -> bool { self.rows.is_empty() }

    pub fn checkout_enabled(&self) -> bool { !self.is_empty() && !self.loading }
}
