//! Product Aggregate
//!
//! The catalog owns product identity, price and availability. Carts only
//! reference products by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use crate::domain::value_objects::{Money, ProductId};

#[derive(Clone, Debug)]
pub struct Product {
    id: ProductId,
    name: String,
    subtitle: String,
    price: Money,
    status: ProductStatus,
    image: String,
    description: String,
    category: String,
    in_stock: bool,
    featured: bool,
    stock_quantity: u32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProductStatus { #[default] InStock, ComingSoon, Limited, PreOrder }

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InStock => "in-stock",
            Self::ComingSoon => "coming-soon",
            Self::Limited => "limited",
            Self::PreOrder => "pre-order",
        }
    }
}

impl fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for ProductStatus {
    type Err = ProductError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in-stock" => Ok(Self::InStock),
            "coming-soon" => Ok(Self::ComingSoon),
            "limited" => Ok(Self::Limited),
            "pre-order" => Ok(Self::PreOrder),
            other => Err(ProductError::UnknownStatus(other.to_string())),
        }
    }
}

impl Product {
    pub fn create(id: ProductId, name: impl Into<String>, price: Money) -> Self {
        let now = Utc::now();
        Self {
            id, name: name.into(), subtitle: String::new(), price, status: ProductStatus::InStock,
            image: String::new(), description: String::new(), category: String::new(),
            in_stock: true, featured: false, stock_quantity: 10, created_at: now, updated_at: now,
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self { self.subtitle = subtitle.into(); self }
    pub fn with_image(mut self, image: impl Into<String>) -> Self { self.image = image.into(); self }
    pub fn with_description(mut self, description: impl Into<String>) -> Self { self.description = description.into(); self }
    pub fn with_category(mut self, category: impl Into<String>) -> Self { self.category = category.into(); self }
    pub fn featured(mut self, featured: bool) -> Self { self.featured = featured; self }
    pub fn with_stock_quantity(mut self, quantity: u32) -> Self { self.stock_quantity = quantity; self }

    /// Sets the marketing status and whether the product can currently be bought.
    pub fn with_availability(mut self, status: ProductStatus, in_stock: bool) -> Self {
        self.status = status;
        self.in_stock = in_stock;
        self
    }

    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    pub fn id(&self) -> &ProductId { &self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn subtitle(&self) -> &str { &self.subtitle }
    pub fn price(&self) -> Money { self.price }
    pub fn status(&self) -> ProductStatus { self.status }
    pub fn image(&self) -> &str { &self.image }
    pub fn description(&self) -> &str { &self.description }
    pub fn category(&self) -> &str { &self.category }
    pub fn is_featured(&self) -> bool { self.featured }
    pub fn stock_quantity(&self) -> u32 { self.stock_quantity }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Whether the product can be placed in a cart and ordered.
    pub fn is_available(&self) -> bool { self.in_stock }

    pub fn update_price(&mut self, new_price: Money) {
        self.price = new_price;
        self.touch();
    }

    pub fn mark_sold_out(&mut self) { self.in_stock = false; self.touch(); }

    /// Shopper-facing text for a request this product cannot fill.
    pub fn shortage_message(&self) -> String {
        if !self.in_stock || self.stock_quantity == 0 {
            format!("{} is out of stock", self.name)
        } else {
            format!("Only {} of {} left", self.stock_quantity, self.name)
        }
    }

    /// Takes `units` out of stock; the product sells out when none are left.
    pub fn withdraw_stock(&mut self, units: u32) -> Result<(), ProductError> {
        if !self.in_stock || units > self.stock_quantity {
            return Err(ProductError::InsufficientStock { available: self.stock_quantity, requested: units });
        }
        self.stock_quantity -= units;
        if self.stock_quantity == 0 {
            self.in_stock = false;
        }
        self.touch();
        Ok(())
    }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProductError {
    #[error("unknown product status {0:?}")]
    UnknownStatus(String),
    #[error("{requested} units requested, {available} in stock")]
    InsufficientStock { available: u32, requested: u32 },
}
