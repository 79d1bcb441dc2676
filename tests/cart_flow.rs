use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::Request;
use axum::middleware::{self, Next};

use storefront_cart::api::{CartView, RegisterRequest};
use storefront_cart::client::{self, CartError, CartPage, CartStore, HeaderBadge, LoadState, StorefrontClient};
use storefront_cart::domain::value_objects::Money;
use storefront_cart::service::{seed, NoopPublisher};
use storefront_cart::{router, ClientConfig, MemoryStore, Storefront};

async fn serve() -> (String, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::with_products(seed::commemorative_coins()));
    let app = router(Storefront::new(store.clone(), Arc::new(NoopPublisher)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    (format!("http://{addr}"), store)
}

/// Like [`serve`], but every request hangs while `stalled` is set.
async fn serve_stallable(stalled: Arc<AtomicBool>) -> String {
    let store = Arc::new(MemoryStore::with_products(seed::commemorative_coins()));
    let app = router(Storefront::new(store, Arc::new(NoopPublisher))).layer(middleware::from_fn(
        move |request: Request, next: Next| {
            let stalled = stalled.clone();
            async move {
                if stalled.load(Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                next.run(request).await
            }
        },
    ));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
    format!("http://{addr}")
}

fn connect_with_timeout(base_url: &str, state_dir: &Path, request_timeout: Duration) -> CartStore<StorefrontClient> {
    let config = ClientConfig {
        base_url: base_url.to_string(),
        request_timeout,
        state_dir: Some(state_dir.to_path_buf()),
    };
    client::connect(&config).unwrap()
}

fn connect(base_url: &str, state_dir: &Path) -> CartStore<StorefrontClient> {
    connect_with_timeout(base_url, state_dir, Duration::from_secs(5))
}

#[tokio::test]
async fn repeated_adds_accumulate_on_one_line() {
    let (url, _) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let store = connect(&url, dir.path());
    let badge = HeaderBadge::new(store.subscribe());

    for n in [1, 2, 3, 4] {
        store.add_item("3", n).await.unwrap();
    }
    let cart = store.current_cart();
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.item("3").unwrap().quantity, 10);
    assert_eq!(cart.subtotal, Money::from_cents(25000));
    assert_eq!(badge.label().as_deref(), Some("10"));
}

#[tokio::test]
async fn concrete_scenario_through_the_store() {
    let (url, _) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let store = connect(&url, dir.path());
    assert_eq!(store.current_cart(), CartView::default());

    store.add_item("3", 1).await.unwrap();
    assert_eq!(store.current_cart().subtotal, Money::from_cents(2500));
    assert_eq!(store.current_cart().item_count, 1);

    store.add_item("3", 2).await.unwrap();
    let page = CartPage::from_snapshot(&store.snapshot());
    assert_eq!(page.rows[0].quantity, 3);
    assert_eq!(page.subtotal, "$75.00");

    store.update_quantity("3", 1).await.unwrap();
    assert_eq!(store.current_cart().subtotal, Money::from_cents(2500));

    for quantity in [0, -1] {
        assert!(matches!(store.update_quantity("3", quantity).await, Err(CartError::Validation(_))));
    }
    assert_eq!(store.fetch_cart().await.unwrap().item("3").unwrap().quantity, 1);

    store.remove_item("3").await.unwrap();
    assert!(store.current_cart().is_empty());
    store.remove_item("3").await.unwrap();
    assert!(store.current_cart().is_empty());

    store.add_item("1", 1).await.unwrap();
    store.clear_cart().await.unwrap();
    assert_eq!(store.fetch_cart().await.unwrap(), CartView::default());
}

#[tokio::test]
async fn checkout_places_order_and_empties_cart() {
    let (url, backend) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let store = connect(&url, dir.path());

    assert_eq!(store.checkout().await, Err(CartError::EmptyCart));
    assert_eq!(backend.order_count().await, 0);

    store.add_item("1", 2).await.unwrap();
    store.add_item("3", 1).await.unwrap();
    let order = store.checkout().await.unwrap();
    assert_eq!(order.total, Money::from_cents(7500));
    assert!(store.current_cart().is_empty());
    assert!(store.fetch_cart().await.unwrap().is_empty());

    let orders = store.orders().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].total, Money::from_cents(7500));
    assert_eq!(backend.order_count().await, 1);
}

#[tokio::test]
async fn anonymous_session_survives_restart() {
    let (url, _) = serve().await;
    let dir = tempfile::tempdir().unwrap();

    connect(&url, dir.path()).add_item("3", 2).await.unwrap();

    let reopened = connect(&url, dir.path());
    assert_eq!(reopened.fetch_cart().await.unwrap().item_count, 2);

    let other = tempfile::tempdir().unwrap();
    assert!(connect(&url, other.path()).fetch_cart().await.unwrap().is_empty());
}

#[tokio::test]
async fn sign_in_carries_the_anonymous_cart() {
    let (url, _) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let store = connect(&url, dir.path());
    store.add_item("3", 2).await.unwrap();

    let request = RegisterRequest {
        username: "toussaint".into(),
        email: "toussaint@example.com".into(),
        password: "bréda1743".into(),
    };
    let badge = HeaderBadge::new(store.subscribe());
    store.register(&request).await.unwrap();
    assert_eq!(store.load_state(), LoadState::Loaded);
    assert_eq!(store.current_cart().item("3").unwrap().quantity, 2);
    assert_eq!(store.api().restore_session().await.unwrap().unwrap().username, "toussaint");

    store.logout().await.unwrap();
    assert!(store.current_cart().is_empty());
    assert_eq!(badge.label(), None);

    store.login("toussaint@example.com", "bréda1743").await.unwrap();
    assert_eq!(store.current_cart().item_count, 2);
    assert_eq!(badge.label().as_deref(), Some("2"));

    assert!(matches!(store.login("toussaint@example.com", "nope").await, Err(CartError::Unauthorized(_))));
    assert_eq!(store.current_cart().item_count, 2);
}

#[tokio::test]
async fn concurrent_tabs_are_serialized_by_the_backend() {
    let (url, _) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    let first = connect(&url, dir.path());
    let second = connect(&url, dir.path());
    first.fetch_cart().await.unwrap();

    tokio::join!(
        async {
            for _ in 0..5 {
                first.add_item("1", 1).await.unwrap();
            }
        },
        async {
            for _ in 0..5 {
                second.add_item("1", 1).await.unwrap();
            }
        },
    );

    assert_eq!(first.fetch_cart().await.unwrap().item("1").unwrap().quantity, 10);
    assert_eq!(second.fetch_cart().await.unwrap().item("1").unwrap().quantity, 10);
}

#[tokio::test]
async fn unreachable_backend_keeps_the_held_cart() {
    let (url, _) = serve().await;
    let dir = tempfile::tempdir().unwrap();
    connect(&url, dir.path()).add_item("3", 1).await.unwrap();

    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let store = connect(&dead, dir.path());
    let err = store.fetch_cart().await.unwrap_err();
    assert!(err.is_retryable(), "{err:?}");
    assert_eq!(err.user_message(), "Could not reach the store, please retry");
    assert_eq!(store.load_state(), LoadState::Unloaded);
    assert!(store.add_item("3", 1).await.is_err());
    assert!(store.current_cart().is_empty());
}

#[tokio::test]
async fn stalled_backend_times_out_and_keeps_the_held_cart() {
    let stalled = Arc::new(AtomicBool::new(false));
    let url = serve_stallable(stalled.clone()).await;
    let dir = tempfile::tempdir().unwrap();
    let store = connect_with_timeout(&url, dir.path(), Duration::from_millis(300));
    store.add_item("3", 2).await.unwrap();

    stalled.store(true, Ordering::SeqCst);
    assert_eq!(store.add_item("3", 1).await, Err(CartError::Timeout));
    let err = store.fetch_cart().await.unwrap_err();
    assert_eq!(err, CartError::Timeout);
    assert!(err.is_retryable());
    assert_eq!(err.user_message(), "Could not reach the store, please retry");

    let snapshot = store.snapshot();
    assert_eq!(snapshot.state, LoadState::Loaded);
    assert_eq!(snapshot.cart.item("3").unwrap().quantity, 2);

    stalled.store(false, Ordering::SeqCst);
    assert_eq!(store.fetch_cart().await.unwrap().item("3").unwrap().quantity, 2);
}
