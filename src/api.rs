//! JSON wire types shared by the HTTP service and the client core.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::aggregates::{Order, OrderStatus, Product, ProductStatus, User};
use crate::domain::value_objects::Money;

/// Header carrying the anonymous cart session id.
pub const SESSION_HEADER: &str = "x-session-id";

// =============================================================================
// Catalog
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductView {
    pub id: String,
    pub name: String,
    pub subtitle: String,
    pub price: Money,
    pub status: ProductStatus,
    pub image: String,
    pub description: String,
    pub category: String,
    pub in_stock: bool,
    pub featured: bool,
    pub stock_quantity: u32,
}

impl From<&Product> for ProductView {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id().to_string(),
            name: p.name().to_string(),
            subtitle: p.subtitle().to_string(),
            price: p.price(),
            status: p.status(),
            image: p.image().to_string(),
            description: p.description().to_string(),
            category: p.category().to_string(),
            in_stock: p.is_available(),
            featured: p.is_featured(),
            stock_quantity: p.stock_quantity(),
        }
    }
}

// =============================================================================
// Cart
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartItemView {
    pub product_id: String,
    pub name: String,
    #[serde(default)]
    pub subtitle: String,
    #[serde(default)]
    pub image: String,
    pub unit_price: Money,
    pub quantity: u32,
    pub line_total: Money,
}

/// A cart as seen by a client, priced from the catalog at read time.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: Money,
    pub item_count: u32,
}

impl CartView {
    pub fn from_items(items: Vec<CartItemView>) -> Self {
        let subtotal = items.iter().map(|i| i.line_total).sum();
        let item_count = items.iter().map(|i| i.quantity).sum();
        Self { items, subtotal, item_count }
    }

    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    pub fn item(&self, product_id: &str) -> Option<&CartItemView> {
        self.items.iter().find(|i| i.product_id == product_id)
    }
}

fn default_quantity() -> i64 { 1 }

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct AddToCartRequest {
    #[validate(length(min = 1, max = 64, message = "product id must be 1 to 64 characters"))]
    pub product_id: String,
    #[serde(default = "default_quantity")]
    #[validate(range(min = 1, max = 10, message = "quantity must be between 1 and 10"))]
    pub quantity: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct UpdateCartRequest {
    #[validate(length(min = 1, max = 64, message = "product id must be 1 to 64 characters"))]
    pub product_id: String,
    #[validate(range(min = 1, max = 10, message = "quantity must be between 1 and 10"))]
    pub quantity: i64,
}

/// Acknowledgement returned by cart mutations.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartAck {
    pub message: String,
    pub item_count: u32,
}

// =============================================================================
// Orders
// =============================================================================

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub total: Money,
    pub message: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderItemView {
    pub product_id: String,
    pub name: String,
    pub image: String,
    pub price: Money,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderView {
    pub id: String,
    pub items: Vec<OrderItemView>,
    pub total: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl From<&Order> for OrderView {
    fn from(o: &Order) -> Self {
        Self {
            id: o.id().to_string(),
            items: o.items().iter().map(|i| OrderItemView {
                product_id: i.product_id.to_string(),
                name: i.name.clone(),
                image: i.image.clone(),
                price: i.unit_price,
                quantity: i.quantity,
            }).collect(),
            total: o.total(),
            status: o.status(),
            created_at: o.created_at(),
        }
    }
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 3, max = 32, message = "username must be 3 to 32 characters"))]
    pub username: String,
    #[validate(email(message = "email address is invalid"))]
    pub email: String,
    #[validate(length(min = 6, message = "password must be at least 6 characters"))]
    pub password: String,
}

#[derive(Clone, Debug, Serialize, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "email address is invalid"))]
    pub email: String,
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: String,
    pub username: String,
    pub email: String,
}

impl From<&User> for UserProfile {
    fn from(u: &User) -> Self {
        Self { id: u.id.to_string(), username: u.username.clone(), email: u.email.clone() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthResponse {
    pub token: String,
    pub user: UserProfile,
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    NotFound,
    OutOfStock,
    EmptyCart,
    Stock,
    Payment,
    Unauthorized,
    Conflict,
    Internal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    pub code: ErrorCode,
}
