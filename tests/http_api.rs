use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use storefront_cart::api::{AuthResponse, CartAck, CartView, CheckoutResponse, ErrorBody, ErrorCode, OrderView, ProductView};
use storefront_cart::domain::value_objects::Money;
use storefront_cart::service::{seed, NoopPublisher};
use storefront_cart::{router, MemoryStore, Storefront};

const SESSION: &str = "session_http_api_test";

fn app() -> Router {
    let store = Arc::new(MemoryStore::with_products(seed::commemorative_coins()));
    router(Storefront::new(store, Arc::new(NoopPublisher)))
}

enum Who<'a> {
    Nobody,
    Session(&'a str),
    Bearer(&'a str),
}

async fn call(app: &Router, method: Method, uri: &str, who: Who<'_>, body: Option<Value>) -> (StatusCode, Vec<u8>) {
    let mut builder = Request::builder().method(method).uri(uri);
    builder = match who {
        Who::Nobody => builder,
        Who::Session(id) => builder.header("x-session-id", id),
        Who::Bearer(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
    };
    let request = match body {
        Some(body) => builder.header(header::CONTENT_TYPE, "application/json").body(Body::from(body.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, bytes.to_vec())
}

fn parse<T: DeserializeOwned>(bytes: &[u8]) -> T {
    serde_json::from_slice(bytes).unwrap_or_else(|e| panic!("{e}: {}", String::from_utf8_lossy(bytes)))
}

async fn expect_error(app: &Router, method: Method, uri: &str, who: Who<'_>, body: Option<Value>) -> (StatusCode, ErrorCode) {
    let (status, bytes) = call(app, method, uri, who, body).await;
    (status, parse::<ErrorBody>(&bytes).code)
}

#[tokio::test]
async fn health_reports_service() {
    let (status, bytes) = call(&app(), Method::GET, "/health", Who::Nobody, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Value>(&bytes)["status"], "healthy");
}

#[tokio::test]
async fn catalog_lists_and_finds_products() {
    let app = app();
    let (status, bytes) = call(&app, Method::GET, "/api/products", Who::Nobody, None).await;
    assert_eq!(status, StatusCode::OK);
    let products: Vec<ProductView> = parse(&bytes);
    assert_eq!(products.len(), 6);

    let (_, bytes) = call(&app, Method::GET, "/api/products/3", Who::Nobody, None).await;
    let coin: ProductView = parse(&bytes);
    assert_eq!(coin.price, Money::from_cents(2500));
    assert!(coin.in_stock);

    assert_eq!(
        expect_error(&app, Method::GET, "/api/products/404", Who::Nobody, None).await,
        (StatusCode::NOT_FOUND, ErrorCode::NotFound)
    );
}

#[tokio::test]
async fn cart_requires_an_identity() {
    let app = app();
    assert_eq!(
        expect_error(&app, Method::GET, "/api/cart", Who::Nobody, None).await,
        (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized)
    );
    assert_eq!(
        expect_error(&app, Method::GET, "/api/cart", Who::Session("no"), None).await,
        (StatusCode::BAD_REQUEST, ErrorCode::Validation)
    );
}

#[tokio::test]
async fn concrete_cart_scenario_over_http() {
    let app = app();
    let who = || Who::Session(SESSION);

    let (status, bytes) = call(&app, Method::POST, "/api/cart/add", who(), Some(json!({"product_id": "3"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<CartAck>(&bytes).item_count, 1);
    let (_, bytes) = call(&app, Method::GET, "/api/cart", who(), None).await;
    let cart: CartView = parse(&bytes);
    assert_eq!(cart.subtotal, Money::from_cents(2500));

    call(&app, Method::POST, "/api/cart/add", who(), Some(json!({"product_id": "3", "quantity": 2}))).await;
    let (_, bytes) = call(&app, Method::GET, "/api/cart", who(), None).await;
    let cart: CartView = parse(&bytes);
    assert_eq!(cart.items.len(), 1);
    assert_eq!(cart.item("3").unwrap().quantity, 3);
    assert_eq!(cart.subtotal, Money::from_cents(7500));

    let (status, _) = call(&app, Method::PUT, "/api/cart/update", who(), Some(json!({"product_id": "3", "quantity": 1}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, bytes) = call(&app, Method::GET, "/api/cart", who(), None).await;
    assert_eq!(parse::<CartView>(&bytes).subtotal, Money::from_cents(2500));

    let (status, _) = call(&app, Method::DELETE, "/api/cart/remove/3", who(), None).await;
    assert_eq!(status, StatusCode::OK);
    let (_, bytes) = call(&app, Method::GET, "/api/cart", who(), None).await;
    assert_eq!(parse::<CartView>(&bytes), CartView::default());
}

#[tokio::test]
async fn rejected_mutations_report_their_codes() {
    let app = app();
    let who = || Who::Session(SESSION);
    call(&app, Method::POST, "/api/cart/add", who(), Some(json!({"product_id": "1", "quantity": 2}))).await;

    for quantity in [0, -1] {
        assert_eq!(
            expect_error(&app, Method::PUT, "/api/cart/update", who(), Some(json!({"product_id": "1", "quantity": quantity}))).await,
            (StatusCode::BAD_REQUEST, ErrorCode::Validation)
        );
    }
    assert_eq!(
        expect_error(&app, Method::POST, "/api/cart/add", who(), Some(json!({"product_id": "2"}))).await,
        (StatusCode::CONFLICT, ErrorCode::OutOfStock)
    );
    assert_eq!(
        expect_error(&app, Method::POST, "/api/cart/add", who(), Some(json!({"product_id": "77"}))).await,
        (StatusCode::NOT_FOUND, ErrorCode::NotFound)
    );
    assert_eq!(
        expect_error(&app, Method::POST, "/api/cart/add", who(), Some(json!({"quantity": "many"}))).await,
        (StatusCode::BAD_REQUEST, ErrorCode::Validation)
    );

    let (status, _) = call(&app, Method::DELETE, "/api/cart/remove/5", who(), None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, bytes) = call(&app, Method::GET, "/api/cart", who(), None).await;
    assert_eq!(parse::<CartView>(&bytes).item("1").unwrap().quantity, 2);
}

#[tokio::test]
async fn checkout_converts_cart_into_order() {
    let app = app();
    let who = || Who::Session(SESSION);

    assert_eq!(
        expect_error(&app, Method::POST, "/api/cart/checkout", who(), None).await,
        (StatusCode::BAD_REQUEST, ErrorCode::EmptyCart)
    );

    call(&app, Method::POST, "/api/cart/add", who(), Some(json!({"product_id": "1", "quantity": 2}))).await;
    call(&app, Method::POST, "/api/cart/add", who(), Some(json!({"product_id": "3"}))).await;
    let (status, bytes) = call(&app, Method::POST, "/api/cart/checkout", who(), None).await;
    assert_eq!(status, StatusCode::OK);
    let order: CheckoutResponse = parse(&bytes);
    assert_eq!(order.total, Money::from_cents(7500));

    let (_, bytes) = call(&app, Method::GET, "/api/cart", who(), None).await;
    assert!(parse::<CartView>(&bytes).is_empty());

    let (_, bytes) = call(&app, Method::GET, "/api/cart/orders", who(), None).await;
    let orders: Vec<OrderView> = parse(&bytes);
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, order.order_id);
    assert_eq!(orders[0].items.len(), 2);
}

#[tokio::test]
async fn sign_in_merges_anonymous_cart_and_logout_revokes() {
    let app = app();
    call(&app, Method::POST, "/api/cart/add", Who::Session(SESSION), Some(json!({"product_id": "3", "quantity": 2}))).await;

    let register = json!({"username": "marie", "email": "Marie@Example.com", "password": "liberte"});
    let (status, bytes) = call(&app, Method::POST, "/api/auth/register", Who::Session(SESSION), Some(register.clone())).await;
    assert_eq!(status, StatusCode::OK);
    let auth: AuthResponse = parse(&bytes);
    assert_eq!(auth.user.email, "marie@example.com");

    let (_, bytes) = call(&app, Method::GET, "/api/cart", Who::Bearer(&auth.token), None).await;
    assert_eq!(parse::<CartView>(&bytes).item("3").unwrap().quantity, 2);
    let (_, bytes) = call(&app, Method::GET, "/api/cart", Who::Session(SESSION), None).await;
    assert!(parse::<CartView>(&bytes).is_empty());

    assert_eq!(
        expect_error(&app, Method::POST, "/api/auth/register", Who::Nobody, Some(register)).await,
        (StatusCode::CONFLICT, ErrorCode::Conflict)
    );

    let (status, bytes) = call(&app, Method::GET, "/api/auth/me", Who::Bearer(&auth.token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(parse::<Value>(&bytes)["username"], "marie");

    let (status, _) = call(&app, Method::POST, "/api/auth/logout", Who::Bearer(&auth.token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        expect_error(&app, Method::GET, "/api/cart", Who::Bearer(&auth.token), None).await,
        (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized)
    );

    let login = json!({"email": "marie@example.com", "password": "wrong"});
    assert_eq!(
        expect_error(&app, Method::POST, "/api/auth/login", Who::Nobody, Some(login)).await,
        (StatusCode::UNAUTHORIZED, ErrorCode::Unauthorized)
    );
}
