//! Storefront service: catalog reads, cart mutations, checkout and accounts.
//!
//! Every cart read prices lines from the catalog at read time. Mutations are
//! validated here and applied through the store's per-owner lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use validator::Validate;

use crate::api::{
    AddToCartRequest, AuthResponse, CartAck, CartItemView, CartView, CheckoutResponse, LoginRequest, OrderView,
    ProductView, RegisterRequest, UpdateCartRequest, UserProfile,
};
use crate::domain::aggregates::{Cart, CartError, Order, OrderItem, Product, User};
use crate::domain::events::{CartEvent, DomainEvent};
use crate::domain::value_objects::{CartIdentity, ProductId, Quantity, SessionId, UserId};
use crate::store::{StoreError, StorefrontStore};

pub mod credentials;
pub mod error;
pub mod events;
pub mod seed;

pub use error::ServiceError;
pub use events::{EventPublisher, NatsPublisher, NoopPublisher};

/// Most orders returned by an order history request.
pub const ORDER_HISTORY_LIMIT: usize = 100;

#[derive(Clone)]
pub struct Storefront {
    store: Arc<dyn StorefrontStore>,
    events: Arc<dyn EventPublisher>,
}

impl Storefront {
    pub fn new(store: Arc<dyn StorefrontStore>, events: Arc<dyn EventPublisher>) -> Self {
        Self { store, events }
    }

    // -------------------------------------------------------------------------
    // Catalog
    // -------------------------------------------------------------------------

    pub async fn list_products(&self) -> Result<Vec<ProductView>, ServiceError> {
        Ok(self.store.list_products().await?.iter().map(ProductView::from).collect())
    }

    pub async fn get_product(&self, id: &str) -> Result<ProductView, ServiceError> {
        let product = self.require_product(&ProductId::new(id)?).await?;
        Ok(ProductView::from(&product))
    }

    async fn require_product(&self, id: &ProductId) -> Result<Product, ServiceError> {
        self.store
            .find_product(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".into()))
    }

    // -------------------------------------------------------------------------
    // Cart
    // -------------------------------------------------------------------------

    pub async fn cart(&self, owner: &CartIdentity) -> Result<CartView, ServiceError> {
        let cart = self.store.load_cart(owner).await?;
        let (cart, products) = self.reconcile(owner, cart).await?;
        let items = cart.lines().values().zip(&products).map(|(line, product)| price_line(product, line.quantity));
        Ok(CartView::from_items(items.collect()))
    }

    pub async fn add_item(&self, owner: &CartIdentity, request: AddToCartRequest) -> Result<CartAck, ServiceError> {
        request.validate()?;
        let product_id = ProductId::new(request.product_id)?;
        let quantity = Quantity::parse(request.quantity)?;

        let product = self.require_product(&product_id).await?;
        if !product.is_available() {
            return Err(ServiceError::OutOfStock(format!("{} is out of stock", product.name())));
        }

        let id = product_id.clone();
        let available = product.stock_quantity();
        let cart = self
            .store
            .update_cart(owner, Box::new(move |cart: &mut Cart| cart.add_item_within(id, quantity, available).map(|_| ())))
            .await
            .map_err(|e| match e {
                StoreError::Cart(CartError::StockExceeded { .. }) => ServiceError::OutOfStock(product.shortage_message()),
                other => other.into(),
            })?;

        tracing::debug!(%owner, %product_id, quantity = quantity.value(), "item added to cart");
        self.publish(DomainEvent::Cart(CartEvent::ItemAdded {
            owner: owner.storage_key(),
            product_id: product_id.to_string(),
            quantity: quantity.value(),
        }))
        .await;
        self.acknowledge(owner, "Item added to cart", cart).await
    }

    pub async fn update_quantity(&self, owner: &CartIdentity, request: UpdateCartRequest) -> Result<CartAck, ServiceError> {
        request.validate()?;
        let product_id = ProductId::new(request.product_id)?;
        let quantity = Quantity::parse(request.quantity)?;

        if let Some(product) = self.store.find_product(&product_id).await? {
            if quantity.value() > product.stock_quantity() {
                return Err(ServiceError::OutOfStock(product.shortage_message()));
            }
        }

        let id = product_id.clone();
        let cart = self
            .store
            .update_cart(owner, Box::new(move |cart: &mut Cart| cart.update_quantity(&id, quantity)))
            .await?;

        self.publish(DomainEvent::Cart(CartEvent::QuantityChanged {
            owner: owner.storage_key(),
            product_id: product_id.to_string(),
            quantity: quantity.value(),
        }))
        .await;
        self.acknowledge(owner, "Cart updated", cart).await
    }

    /// Idempotent: removing a product that is not in the cart succeeds.
    pub async fn remove_item(&self, owner: &CartIdentity, product_id: &str) -> Result<CartAck, ServiceError> {
        let product_id = ProductId::new(product_id)?;
        let id = product_id.clone();
        let removed = Arc::new(AtomicBool::new(false));
        let flag = removed.clone();
        let cart = self
            .store
            .update_cart(owner, Box::new(move |cart: &mut Cart| {
                flag.store(cart.remove_item(&id), Ordering::Relaxed);
                Ok(())
            }))
            .await?;

        if removed.load(Ordering::Relaxed) {
            self.publish(DomainEvent::Cart(CartEvent::ItemRemoved {
                owner: owner.storage_key(),
                product_id: product_id.to_string(),
            }))
            .await;
        }
        self.acknowledge(owner, "Item removed from cart", cart).await
    }

    pub async fn clear_cart(&self, owner: &CartIdentity) -> Result<CartAck, ServiceError> {
        let cart = self
            .store
            .update_cart(owner, Box::new(|cart: &mut Cart| { cart.clear(); Ok(()) }))
            .await?;
        self.publish(DomainEvent::Cart(CartEvent::Cleared { owner: owner.storage_key() })).await;
        self.acknowledge(owner, "Cart cleared", cart).await
    }

    /// Converts the cart into a pending order, takes its lines out of stock
    /// and empties it. Never retried internally; every failure is returned to
    /// the caller as is.
    pub async fn checkout(&self, owner: &CartIdentity) -> Result<CheckoutResponse, ServiceError> {
        let cart = self.store.load_cart(owner).await?;
        let (cart, products) = self.reconcile(owner, cart).await?;
        if cart.is_empty() {
            return Err(ServiceError::EmptyCart);
        }

        let mut items = Vec::with_capacity(cart.line_count());
        for (line, product) in cart.lines().values().zip(&products) {
            if !product.is_available() || line.quantity > product.stock_quantity() {
                return Err(ServiceError::Stock(product.shortage_message()));
            }
            items.push(OrderItem {
                product_id: product.id().clone(),
                name: product.name().to_string(),
                image: product.image().to_string(),
                unit_price: product.price(),
                quantity: line.quantity,
            });
        }

        let mut order = Order::place(owner.clone(), items).map_err(|_| ServiceError::EmptyCart)?;
        let events = order.take_events();
        self.store.commit_order(&order, &cart.fingerprint()).await?;

        tracing::info!(%owner, order_id = %order.id(), total = %order.total(), "order placed");
        for event in &events {
            self.events.publish(event).await;
        }
        Ok(CheckoutResponse {
            order_id: order.id().to_string(),
            total: order.total(),
            message: "Order created successfully".into(),
        })
    }

    pub async fn orders(&self, owner: &CartIdentity) -> Result<Vec<OrderView>, ServiceError> {
        let orders = self.store.list_orders(owner, ORDER_HISTORY_LIMIT).await?;
        Ok(orders.iter().map(OrderView::from).collect())
    }

    // -------------------------------------------------------------------------
    // Accounts
    // -------------------------------------------------------------------------

    pub async fn register(&self, request: RegisterRequest, session: Option<SessionId>) -> Result<AuthResponse, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();
        if self.store.find_user_by_email(&email).await?.is_some()
            || self.store.find_user_by_username(&request.username).await?.is_some()
        {
            return Err(ServiceError::Conflict("Username or email already registered".into()));
        }

        let user = User::register(request.username, email, credentials::hash_password(&request.password));
        self.store.insert_user(&user).await?;
        tracing::info!(user_id = %user.id, "user registered");
        self.open_session(&user, session).await
    }

    pub async fn login(&self, request: LoginRequest, session: Option<SessionId>) -> Result<AuthResponse, ServiceError> {
        request.validate()?;
        let email = request.email.trim().to_lowercase();
        let user = self
            .store
            .find_user_by_email(&email)
            .await?
            .filter(|u| credentials::verify_password(&request.password, &u.password_hash))
            .ok_or_else(|| ServiceError::Unauthorized("Incorrect email or password".into()))?;
        self.open_session(&user, session).await
    }

    /// Resolves a bearer token to its user.
    pub async fn authenticate(&self, token: &str) -> Result<UserId, ServiceError> {
        self.store
            .resolve_token(&credentials::token_digest(token))
            .await?
            .ok_or_else(|| ServiceError::Unauthorized("Invalid or expired token".into()))
    }

    pub async fn me(&self, token: &str) -> Result<UserProfile, ServiceError> {
        let user_id = self.authenticate(token).await?;
        let user = self
            .store
            .find_user(user_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("User not found".into()))?;
        Ok(UserProfile::from(&user))
    }

    pub async fn logout(&self, token: &str) -> Result<(), ServiceError> {
        if !self.store.revoke_token(&credentials::token_digest(token)).await? {
            return Err(ServiceError::Unauthorized("Invalid or expired token".into()));
        }
        Ok(())
    }

    /// Issues a token and folds any anonymous cart into the user's cart.
    async fn open_session(&self, user: &User, session: Option<SessionId>) -> Result<AuthResponse, ServiceError> {
        let token = credentials::issue_token();
        self.store.insert_token(&credentials::token_digest(&token), user.id).await?;

        if let Some(session) = session {
            let from = CartIdentity::Session(session);
            let into = CartIdentity::User(user.id);
            let lines = self.store.merge_carts(&from, &into).await?;
            if lines > 0 {
                tracing::info!(%from, %into, lines, "merged anonymous cart into user cart");
                self.publish(DomainEvent::Cart(CartEvent::Merged {
                    from: from.storage_key(),
                    into: into.storage_key(),
                    lines,
                }))
                .await;
            }
        }

        Ok(AuthResponse { token, user: UserProfile::from(user) })
    }

    /// Resolves every line against the catalog and drops lines whose product
    /// left it. The returned products follow the order of `cart.lines()`.
    async fn reconcile(&self, owner: &CartIdentity, mut cart: Cart) -> Result<(Cart, Vec<Product>), ServiceError> {
        loop {
            let mut products = Vec::with_capacity(cart.line_count());
            let mut missing = Vec::new();
            for product_id in cart.lines().keys() {
                match self.store.find_product(product_id).await? {
                    Some(product) => products.push(product),
                    None => missing.push(product_id.clone()),
                }
            }
            if missing.is_empty() {
                return Ok((cart, products));
            }

            tracing::warn!(%owner, ?missing, "dropping cart lines for products missing from the catalog");
            cart = self
                .store
                .update_cart(owner, Box::new(move |cart: &mut Cart| {
                    for product_id in &missing {
                        cart.remove_item(product_id);
                    }
                    Ok(())
                }))
                .await?;
        }
    }

    /// Acks count only lines a cart read would show.
    async fn acknowledge(&self, owner: &CartIdentity, message: &str, cart: Cart) -> Result<CartAck, ServiceError> {
        let (cart, _) = self.reconcile(owner, cart).await?;
        Ok(CartAck { message: message.to_string(), item_count: cart.item_count() })
    }

    async fn publish(&self, event: DomainEvent) {
        self.events.publish(&event).await;
    }
}

fn price_line(product: &Product, quantity: u32) -> CartItemView {
    CartItemView {
        product_id: product.id().to_string(),
        name: product.name().to_string(),
        subtitle: product.subtitle().to_string(),
        image: product.image().to_string(),
        unit_price: product.price(),
        quantity,
        line_total: product.price().multiply(quantity),
    }
}
