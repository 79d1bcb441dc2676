//! In-process store used when no database is configured, and by tests.

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

use super::{withdraw_stock, CartFingerprint, CartMutation, StoreError, StorefrontStore};
use crate::domain::aggregates::{Cart, Order, Product, User};
use crate::domain::value_objects::{CartIdentity, ProductId, UserId};

#[derive(Default)]
struct Inner {
    products: BTreeMap<ProductId, Product>,
    carts: HashMap<CartIdentity, Cart>,
    orders: Vec<Order>,
    users: HashMap<UserId, User>,
    tokens: HashMap<String, (UserId, bool)>,
}

impl Inner {
    fn cart(&self, owner: &CartIdentity) -> Cart {
        self.carts.get(owner).cloned().unwrap_or_else(|| Cart::empty(owner.clone()))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    /// Builds a store whose catalog holds `products`.
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let inner = Inner {
            products: products.into_iter().map(|p| (p.id().clone(), p)).collect(),
            ..Inner::default()
        };
        Self { inner: RwLock::new(inner) }
    }

    pub async fn order_count(&self) -> usize { self.inner.read().await.orders.len() }
}

#[async_trait]
impl StorefrontStore for MemoryStore {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.inner.read().await.products.values().cloned().collect())
    }

    async fn find_product(&self, id: &ProductId) -> Result<Option<Product>, StoreError> {
        Ok(self.inner.read().await.products.get(id).cloned())
    }

    async fn upsert_product(&self, product: &Product) -> Result<(), StoreError> {
        self.inner.write().await.products.insert(product.id().clone(), product.clone());
        Ok(())
    }

    async fn load_cart(&self, owner: &CartIdentity) -> Result<Cart, StoreError> {
        Ok(self.inner.read().await.cart(owner))
    }

    async fn update_cart(&self, owner: &CartIdentity, mutation: CartMutation) -> Result<Cart, StoreError> {
        let mut inner = self.inner.write().await;
        let mut cart = inner.cart(owner);
        mutation(&mut cart)?;
        inner.carts.insert(owner.clone(), cart.clone());
        Ok(cart)
    }

    async fn merge_carts(&self, from: &CartIdentity, into: &CartIdentity) -> Result<usize, StoreError> {
        let mut inner = self.inner.write().await;
        let mut source = inner.cart(from);
        if source.is_empty() { return Ok(0); }
        let mut target = inner.cart(into);
        target.absorb(&source);
        let moved = source.line_count();
        source.clear();
        inner.carts.insert(into.clone(), target);
        inner.carts.insert(from.clone(), source);
        Ok(moved)
    }

    async fn commit_order(&self, order: &Order, expected: &CartFingerprint) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        let mut cart = inner.cart(order.owner());
        if &cart.fingerprint() != expected {
            return Err(StoreError::Conflict("cart changed during checkout".into()));
        }
        let mut withdrawn = Vec::with_capacity(order.items().len());
        for item in order.items() {
            let mut product = inner
                .products
                .get(&item.product_id)
                .cloned()
                .ok_or_else(|| StoreError::Stock(format!("Product {} is no longer available", item.product_id)))?;
            withdraw_stock(&mut product, item.quantity)?;
            withdrawn.push(product);
        }
        for product in withdrawn {
            inner.products.insert(product.id().clone(), product);
        }
        cart.clear();
        inner.carts.insert(order.owner().clone(), cart);
        inner.orders.push(order.clone());
        Ok(())
    }

    async fn list_orders(&self, owner: &CartIdentity, limit: usize) -> Result<Vec<Order>, StoreError> {
        let inner = self.inner.read().await;
        let mut orders: Vec<Order> = inner.orders.iter().filter(|o| o.owner() == owner).cloned().collect();
        orders.sort_by(|a, b| b.created_at().cmp(&a.created_at()).then_with(|| b.id().cmp(&a.id())));
        orders.truncate(limit);
        Ok(orders)
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        let mut inner = self.inner.write().await;
        if inner.users.values().any(|u| u.email == user.email || u.username == user.username) {
            return Err(StoreError::Conflict("Username or email already registered".into()));
        }
        inner.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.values().find(|u| u.email == email).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user(&self, id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn insert_token(&self, token_hash: &str, user: UserId) -> Result<(), StoreError> {
        self.inner.write().await.tokens.insert(token_hash.to_string(), (user, true));
        Ok(())
    }

    async fn resolve_token(&self, token_hash: &str) -> Result<Option<UserId>, StoreError> {
        let inner = self.inner.read().await;
        Ok(inner.tokens.get(token_hash).filter(|(_, active)| *active).map(|(user, _)| *user))
    }

    async fn revoke_token(&self, token_hash: &str) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        match inner.tokens.get_mut(token_hash) {
            Some((_, active)) if *active => { *active = false; Ok(true) }
            _ => Ok(false),
        }
    }
}
