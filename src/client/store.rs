//! Client cart store.
//!
//! Holds the last cart fetched from the backend and funnels every mutation
//! through write-then-reread: the mutation is sent, and only a successful
//! refetch changes what consumers see. Mutations are serialized so each one
//! completes its round trip before the next read or write starts.

use chrono::{DateTime, Utc};
use tokio::sync::{watch, Mutex};

use super::api::{CartApi, StorefrontClient};
use super::error::CartError;
use crate::api::{AddToCartRequest, AuthResponse, CartAck, CartView, CheckoutResponse, OrderView, RegisterRequest, UpdateCartRequest};
use crate::domain::value_objects::{ProductId, Quantity};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoadState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct CartSnapshot {
    pub cart: CartView,
    pub state: LoadState,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl CartSnapshot {
    pub fn item_count(&self) -> u32 { self.cart.item_count }
}

pub struct CartStore<A> {
    api: A,
    snapshot: watch::Sender<CartSnapshot>,
    writer: Mutex<()>,
}

impl<A: CartApi> CartStore<A> {
    pub fn new(api: A) -> Self {
        let (snapshot, _) = watch::channel(CartSnapshot::default());
        Self { api, snapshot, writer: Mutex::new(()) }
    }

    pub fn api(&self) -> &A { &self.api }

    pub fn subscribe(&self) -> watch::Receiver<CartSnapshot> { self.snapshot.subscribe() }

    /// Last fetched cart; the empty cart before the first fetch.
    pub fn current_cart(&self) -> CartView { self.snapshot.borrow().cart.clone() }

    pub fn load_state(&self) -> LoadState { self.snapshot.borrow().state }

    pub fn snapshot(&self) -> CartSnapshot { self.snapshot.borrow().clone() }

    pub async fn fetch_cart(&self) -> Result<CartView, CartError> {
        let _writer = self.writer.lock().await;
        self.refresh().await
    }

    /// Forgets the held cart, e.g. after the identity changed.
    pub fn reset(&self) {
        self.snapshot.send_replace(CartSnapshot::default());
    }

    pub async fn add_item(&self, product_id: &str, quantity: i64) -> Result<CartAck, CartError> {
        let request = AddToCartRequest { product_id: product_id_of(product_id)?, quantity: quantity_of(quantity)? };
        let _writer = self.writer.lock().await;
        let ack = self.api.add_item(&request).await.map_err(|e| rejected("add_item", e))?;
        self.reread("add_item").await;
        Ok(ack)
    }

    pub async fn update_quantity(&self, product_id: &str, quantity: i64) -> Result<CartAck, CartError> {
        let request = UpdateCartRequest { product_id: product_id_of(product_id)?, quantity: quantity_of(quantity)? };
        let _writer = self.writer.lock().await;
        let ack = self.api.update_quantity(&request).await.map_err(|e| rejected("update_quantity", e))?;
        self.reread("update_quantity").await;
        Ok(ack)
    }

    /// Removing a product that is not in the cart succeeds.
    pub async fn remove_item(&self, product_id: &str) -> Result<CartAck, CartError> {
        let product_id = product_id_of(product_id)?;
        let _writer = self.writer.lock().await;
        let ack = self.api.remove_item(&product_id).await.map_err(|e| rejected("remove_item", e))?;
        self.reread("remove_item").await;
        Ok(ack)
    }

    pub async fn clear_cart(&self) -> Result<CartAck, CartError> {
        let _writer = self.writer.lock().await;
        let ack = self.api.clear_cart().await.map_err(|e| rejected("clear_cart", e))?;
        self.reread("clear_cart").await;
        Ok(ack)
    }

    /// Places an order from the server-side cart. Never retried.
    pub async fn checkout(&self) -> Result<CheckoutResponse, CartError> {
        let _writer = self.writer.lock().await;
        let order = self.api.checkout().await.map_err(|e| rejected("checkout", e))?;
        tracing::info!(order_id = %order.order_id, total = %order.total, "order placed");
        self.reread("checkout").await;
        Ok(order)
    }

    pub async fn orders(&self) -> Result<Vec<OrderView>, CartError> {
        self.api.orders().await
    }

    async fn refresh(&self) -> Result<CartView, CartError> {
        self.snapshot.send_modify(|s| s.state = LoadState::Loading);
        match self.api.get_cart().await {
            Ok(cart) => {
                tracing::debug!(items = cart.item_count, subtotal = %cart.subtotal, "cart fetched");
                self.snapshot.send_replace(CartSnapshot {
                    cart: cart.clone(),
                    state: LoadState::Loaded,
                    fetched_at: Some(Utc::now()),
                });
                Ok(cart)
            }
            Err(error) => {
                tracing::warn!(%error, "cart fetch failed, keeping the previous cart");
                self.snapshot.send_modify(|s| {
                    s.state = if s.fetched_at.is_some() { LoadState::Loaded } else { LoadState::Unloaded };
                });
                Err(error)
            }
        }
    }

    async fn reread(&self, operation: &'static str) {
        if let Err(error) = self.refresh().await {
            tracing::warn!(operation, %error, "mutation applied but the cart could not be refetched");
        }
    }
}

/// Identity changes. Each one swaps the cart the backend answers with, so the
/// held cart is dropped and fetched again under the new identity.
impl CartStore<StorefrontClient> {
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthResponse, CartError> {
        let _writer = self.writer.lock().await;
        let auth = self.api.register(request).await?;
        self.switch_identity("register").await;
        Ok(auth)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, CartError> {
        let _writer = self.writer.lock().await;
        let auth = self.api.login(email, password).await?;
        self.switch_identity("login").await;
        Ok(auth)
    }

    /// Credentials are dropped locally even when the server call fails.
    pub async fn logout(&self) -> Result<(), CartError> {
        let _writer = self.writer.lock().await;
        let result = self.api.logout().await;
        self.switch_identity("logout").await;
        result
    }

    async fn switch_identity(&self, operation: &'static str) {
        self.reset();
        self.reread(operation).await;
    }
}

fn product_id_of(raw: &str) -> Result<String, CartError> {
    ProductId::new(raw)
        .map(|id| id.as_str().to_string())
        .map_err(|e| CartError::Validation(e.to_string()))
}

fn quantity_of(raw: i64) -> Result<i64, CartError> {
    Quantity::parse(raw).map(|q| i64::from(q.value())).map_err(|e| CartError::Validation(e.to_string()))
}

fn rejected(operation: &'static str, error: CartError) -> CartError {
    if error.is_retryable() {
        tracing::warn!(operation, %error, "cart operation failed");
    } else {
        tracing::debug!(operation, %error, "cart operation rejected");
    }
    error
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::local::LocalCartApi;
    use crate::domain::value_objects::{CartIdentity, Money, SessionId};
    use crate::service::{seed, NoopPublisher, Storefront};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Wraps the in-process API with switchable failures and a call counter.
    struct FlakyApi {
        inner: LocalCartApi,
        fail_reads: AtomicBool,
        fail_writes: parking_lot::Mutex<Option<CartError>>,
        writes: AtomicUsize,
    }

    impl FlakyApi {
        fn fail_next_write(&self, error: CartError) { *self.fail_writes.lock() = Some(error); }

        fn write(&self) -> Result<(), CartError> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            match self.fail_writes.lock().take() {
                Some(error) => Err(error),
                None => Ok(()),
            }
        }
    }

    #[async_trait]
    impl CartApi for FlakyApi {
        async fn get_cart(&self) -> Result<CartView, CartError> {
            if self.fail_reads.load(Ordering::SeqCst) {
                return Err(CartError::Network("connection refused".into()));
            }
            self.inner.get_cart().await
        }
        async fn add_item(&self, request: &AddToCartRequest) -> Result<CartAck, CartError> {
            self.write()?;
            self.inner.add_item(request).await
        }
        async fn update_quantity(&self, request: &UpdateCartRequest) -> Result<CartAck, CartError> {
            self.write()?;
            self.inner.update_quantity(request).await
        }
        async fn remove_item(&self, product_id: &str) -> Result<CartAck, CartError> {
            self.write()?;
            self.inner.remove_item(product_id).await
        }
        async fn clear_cart(&self) -> Result<CartAck, CartError> {
            self.write()?;
            self.inner.clear_cart().await
        }
        async fn checkout(&self) -> Result<CheckoutResponse, CartError> {
            self.write()?;
            self.inner.checkout().await
        }
        async fn orders(&self) -> Result<Vec<OrderView>, CartError> { self.inner.orders().await }
    }

    fn cart_store() -> CartStore<FlakyApi> {
        let store = Arc::new(MemoryStore::with_products(seed::commemorative_coins()));
        let storefront = Storefront::new(store, Arc::new(NoopPublisher));
        let inner = LocalCartApi::new(storefront, CartIdentity::Session(SessionId::generate()));
        CartStore::new(FlakyApi {
            inner,
            fail_reads: AtomicBool::new(false),
            fail_writes: parking_lot::Mutex::new(None),
            writes: AtomicUsize::new(0),
        })
    }

    #[tokio::test]
    async fn test_initial_state_is_empty_and_unloaded() {
        let store = cart_store();
        assert_eq!(store.current_cart(), CartView::default());
        assert_eq!(store.current_cart().subtotal, Money::ZERO);
        assert_eq!(store.load_state(), LoadState::Unloaded);
    }

    #[tokio::test]
    async fn test_concrete_scenario() {
        let store = cart_store();

        store.add_item("3", 1).await.unwrap();
        assert_eq!(store.current_cart().subtotal, Money::from_cents(2500));
        assert_eq!(store.current_cart().item_count, 1);

        store.add_item("3", 2).await.unwrap();
        assert_eq!(store.current_cart().item("3").unwrap().quantity, 3);
        assert_eq!(store.current_cart().subtotal, Money::from_cents(7500));

        store.update_quantity("3", 1).await.unwrap();
        assert_eq!(store.current_cart().subtotal, Money::from_cents(2500));

        store.remove_item("3").await.unwrap();
        assert!(store.current_cart().is_empty());
        assert_eq!(store.load_state(), LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_invalid_quantities_never_reach_the_backend() {
        let store = cart_store();
        store.add_item("3", 2).await.unwrap();

        for quantity in [0, -1, 11] {
            let err = store.update_quantity("3", quantity).await.unwrap_err();
            assert!(matches!(err, CartError::Validation(_)), "{quantity}: {err:?}");
        }
        assert!(matches!(store.add_item("3", 0).await, Err(CartError::Validation(_))));
        assert!(matches!(store.add_item("  ", 1).await, Err(CartError::Validation(_))));

        assert_eq!(store.api().writes.load(Ordering::SeqCst), 1);
        assert_eq!(store.fetch_cart().await.unwrap().item("3").unwrap().quantity, 2);
    }

    #[tokio::test]
    async fn test_failed_fetch_keeps_previous_cart() {
        let store = cart_store();
        store.api().fail_reads.store(true, Ordering::SeqCst);
        assert!(store.fetch_cart().await.is_err());
        assert_eq!(store.load_state(), LoadState::Unloaded);

        store.api().fail_reads.store(false, Ordering::SeqCst);
        store.add_item("1", 2).await.unwrap();
        let before = store.current_cart();

        store.api().fail_reads.store(true, Ordering::SeqCst);
        let err = store.fetch_cart().await.unwrap_err();
        assert!(err.is_retryable());
        assert_eq!(store.current_cart(), before);
        assert_eq!(store.load_state(), LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_failed_mutation_leaves_store_untouched() {
        let store = cart_store();
        store.add_item("3", 1).await.unwrap();
        let before = store.snapshot();

        store.api().fail_next_write(CartError::Timeout);
        assert_eq!(store.add_item("3", 1).await, Err(CartError::Timeout));
        assert_eq!(store.snapshot(), before);
    }

    #[tokio::test]
    async fn test_mutation_succeeds_even_if_refetch_fails() {
        let store = cart_store();
        store.fetch_cart().await.unwrap();
        store.api().fail_reads.store(true, Ordering::SeqCst);

        let ack = store.add_item("3", 2).await.unwrap();
        assert_eq!(ack.item_count, 2);
        assert!(store.current_cart().is_empty());
        assert_eq!(store.load_state(), LoadState::Loaded);
    }

    #[tokio::test]
    async fn test_rejections_surface_server_messages() {
        let store = cart_store();
        assert!(matches!(store.add_item("2", 1).await, Err(CartError::OutOfStock(_))));
        assert!(matches!(store.add_item("999", 1).await, Err(CartError::NotFound(_))));
        assert!(matches!(store.update_quantity("1", 1).await, Err(CartError::NotFound(_))));
        assert_eq!(store.checkout().await, Err(CartError::EmptyCart));
    }

    #[tokio::test]
    async fn test_checkout_empties_cart_and_is_not_retried() {
        let store = cart_store();
        store.add_item("1", 2).await.unwrap();
        store.add_item("3", 1).await.unwrap();

        store.api().fail_next_write(CartError::Payment("Card declined".into()));
        let writes = store.api().writes.load(Ordering::SeqCst);
        let err = store.checkout().await.unwrap_err();
        assert_eq!(err.user_message(), "Card declined");
        assert_eq!(store.api().writes.load(Ordering::SeqCst), writes + 1);
        assert_eq!(store.current_cart().item_count, 3);

        let order = store.checkout().await.unwrap();
        assert_eq!(order.total, Money::from_cents(7500));
        assert!(store.current_cart().is_empty());
        assert!(store.fetch_cart().await.unwrap().is_empty());
        assert_eq!(store.orders().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_see_refetched_cart() {
        let store = cart_store();
        let mut rx = store.subscribe();
        store.add_item("3", 1).await.unwrap();
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().item_count(), 1);

        store.reset();
        assert_eq!(rx.borrow().state, LoadState::Unloaded);
        assert!(store.current_cart().is_empty());
    }
}
