//! Cart Aggregate
//!
//! A cart only records which products an identity selected and how many.
//! Prices and display fields are joined from the catalog on every read, so a
//! cart can never carry a stale price.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;
use crate::domain::value_objects::{CartIdentity, ProductId, Quantity, MAX_LINE_QUANTITY};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CartLine {
    pub quantity: u32,
    pub added_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct Cart {
    owner: CartIdentity,
    lines: BTreeMap<ProductId, CartLine>,
    updated_at: DateTime<Utc>,
}

impl Cart {
    /// Carts are created implicitly: an identity with no stored lines gets an empty one.
    pub fn empty(owner: CartIdentity) -> Self {
        Self { owner, lines: BTreeMap::new(), updated_at: Utc::now() }
    }

    pub fn restore(owner: CartIdentity, lines: BTreeMap<ProductId, CartLine>, updated_at: DateTime<Utc>) -> Self {
        Self { owner, lines, updated_at }
    }

    pub fn owner(&self) -> &CartIdentity { &self.owner }
    pub fn lines(&self) -> &BTreeMap<ProductId, CartLine> { &self.lines }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn line_count(&self) -> usize { self.lines.len() }
    pub fn quantity_of(&self, product_id: &ProductId) -> Option<u32> { self.lines.get(product_id).map(|l| l.quantity) }

    /// Sum of quantities across all lines.
    pub fn item_count(&self) -> u32 { self.lines.values().map(|l| l.quantity).sum() }

    /// Product id to quantity, used to detect concurrent changes between read and commit.
    pub fn fingerprint(&self) -> BTreeMap<ProductId, u32> {
        self.lines.iter().map(|(id, line)| (id.clone(), line.quantity)).collect()
    }

    /// Adds to an existing line or creates one. Returns the new line quantity.
    pub fn add_item(&mut self, product_id: ProductId, quantity: Quantity) -> Result<u32, CartError> {
        self.add_units(product_id, quantity.value())
    }

    /// Like [`Cart::add_item`], but the line may not grow past `available` units.
    pub fn add_item_within(&mut self, product_id: ProductId, quantity: Quantity, available: u32) -> Result<u32, CartError> {
        let next = self.quantity_of(&product_id).unwrap_or(0).saturating_add(quantity.value());
        if next > available {
            return Err(CartError::StockExceeded { product_id, available });
        }
        self.add_item(product_id, quantity)
    }

    pub fn update_quantity(&mut self, product_id: &ProductId, quantity: Quantity) -> Result<(), CartError> {
        let line = self.lines.get_mut(product_id).ok_or_else(|| CartError::ItemNotFound(product_id.clone()))?;
        line.quantity = quantity.value();
        self.touch();
        Ok(())
    }

    /// Removing an absent product is a no-op. Returns whether a line was removed.
    pub fn remove_item(&mut self, product_id: &ProductId) -> bool {
        let removed = self.lines.remove(product_id).is_some();
        if removed { self.touch(); }
        removed
    }

    pub fn clear(&mut self) { self.lines.clear(); self.touch(); }

    /// Folds another cart's lines into this one, clamping each line at the cap.
    pub fn absorb(&mut self, other: &Cart) {
        for (product_id, line) in &other.lines {
            let entry = self.lines.entry(product_id.clone()).or_insert(CartLine { quantity: 0, added_at: line.added_at });
            entry.quantity = entry.quantity.saturating_add(line.quantity).min(MAX_LINE_QUANTITY);
        }
        if !other.lines.is_empty() { self.touch(); }
    }

    fn add_units(&mut self, product_id: ProductId, units: u32) -> Result<u32, CartError> {
        let current = self.quantity_of(&product_id).unwrap_or(0);
        let next = current.saturating_add(units);
        if next > MAX_LINE_QUANTITY {
            return Err(CartError::LineLimitExceeded { product_id, requested: next });
        }
        let now = Utc::now();
        self.lines.entry(product_id).or_insert(CartLine { quantity: 0, added_at: now }).quantity = next;
        self.touch();
        Ok(next)
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("item {0} not found in cart")]
    ItemNotFound(ProductId),
    #[error("a cart line may hold at most {max} units, {requested} requested for {product_id}", max = MAX_LINE_QUANTITY)]
    LineLimitExceeded { product_id: ProductId, requested: u32 },
    #[error("only {available} units of {product_id} are in stock")]
    StockExceeded { product_id: ProductId, available: u32 },
}
