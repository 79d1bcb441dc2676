//! Persistence for catalog, carts, orders and accounts.
//!
//! The backend is the serialization point for cart mutations: every
//! implementation applies a [`CartMutation`] as one read-modify-write under a
//! per-owner lock.

use async_trait::async_trait;
use std::collections::BTreeMap;
use thiserror::Error;

use crate::domain::aggregates::{Cart, CartError, Order, Product, User};
use crate::domain::value_objects::{CartIdentity, ProductId, UserId};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A change applied to a cart while the owner's lock is held.
pub type CartMutation = Box<dyn FnOnce(&mut Cart) -> Result<(), CartError> + Send>;

/// Product id to quantity, as produced by [`Cart::fingerprint`].
pub type CartFingerprint = BTreeMap<ProductId, u32>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Cart(#[from] CartError),

    #[error("conflict: {0}")]
    Conflict(String),

    /// An order line asks for more units than the catalog holds.
    #[error("{0}")]
    Stock(String),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),

    #[error("database error")]
    Database(#[source] sqlx::Error),

    #[error("migration failed")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for StoreError {
    fn from(error: sqlx::Error) -> Self {
        match &error {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                tracing::debug!(constraint = ?db.constraint(), message = db.message(), "unique violation");
                Self::Conflict(conflict_message(db.constraint()).to_string())
            }
            _ => Self::Database(error),
        }
    }
}

/// Shopper-facing text for a unique violation. The database message names
/// tables and echoes the offending values, so it never leaves the store.
fn conflict_message(constraint: Option<&str>) -> &'static str {
    match constraint {
        Some(name) if name.starts_with("users_") => "Username or email already registered",
        _ => "Record already exists",
    }
}

/// Takes one order line out of `product`'s stock.
fn withdraw_stock(product: &mut Product, units: u32) -> Result<(), StoreError> {
    product.withdraw_stock(units).map_err(|_| StoreError::Stock(product.shortage_message()))
}

#[async_trait]
pub trait StorefrontStore: Send + Sync {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError>;
    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError>;
    async fn upsert_product(&self, product: &Product) -> Result<(), StoreError>;

    /// Returns the owner's cart, or an empty one if nothing was stored yet.
    async fn load_cart(&self, owner: &CartIdentity) -> Result<Cart, StoreError>;

    /// Applies `mutation` atomically and persists the result. A rejected
    /// mutation leaves the stored cart untouched.
    async fn update_cart(&self, owner: &CartIdentity, mutation: CartMutation) -> Result<Cart, StoreError>;

    /// Moves every line of `from` into `into` and empties `from`. Returns the
    /// number of lines moved.
    async fn merge_carts(&self, from: &CartIdentity, into: &CartIdentity) -> Result<usize, StoreError>;

    /// Inserts `order`, takes its lines out of stock and empties its owner's
    /// cart in one step, provided the cart still matches `expected`.
    /// Otherwise fails with [`StoreError::Conflict`], or [`StoreError::Stock`]
    /// when a line cannot be filled, and changes nothing.
    async fn commit_order(&self, order: &Order, expected: &CartFingerprint) -> Result<(), StoreError>;

    /// Newest first.
    async fn list_orders(&self, owner: &CartIdentity, limit: usize) -> Result<Vec<Order>, StoreError>;

    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;
    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError>;

    async fn insert_token(&self, token_hash: &str, user: UserId) -> Result<(), StoreError>;
    async fn resolve_token(&self, token_hash: &str) -> Result<Option<UserId>, StoreError>;
    /// Returns whether an active token was revoked.
    async fn revoke_token(&self, token_hash: &str) -> Result<bool, StoreError>;
}
