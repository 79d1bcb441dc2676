//! REST surface: catalog, accounts and the cart/checkout routes.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::api::{
    AddToCartRequest, AuthResponse, CartAck, CartView, CheckoutResponse, LoginRequest, OrderView, ProductView,
    RegisterRequest, UpdateCartRequest, UserProfile,
};
use crate::service::Storefront;

pub mod error;
pub mod extract;

use error::ApiError;
use extract::{AnonymousSession, Bearer, CartOwner};

#[derive(Clone)]
pub struct AppState {
    pub storefront: Storefront,
}

pub fn router(storefront: Storefront) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-cart"})) }))
        .route("/api/products", get(list_products))
        .route("/api/products/:id", get(get_product))
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/auth/logout", post(logout))
        .route("/api/cart", get(get_cart))
        .route("/api/cart/add", post(add_to_cart))
        .route("/api/cart/update", put(update_cart_item))
        .route("/api/cart/remove/:product_id", delete(remove_from_cart))
        .route("/api/cart/clear", delete(clear_cart))
        .route("/api/cart/checkout", post(checkout))
        .route("/api/cart/orders", get(list_orders))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(AppState { storefront })
}

type ApiResult<T> = Result<Json<T>, ApiError>;

async fn list_products(State(s): State<AppState>) -> ApiResult<Vec<ProductView>> {
    Ok(Json(s.storefront.list_products().await?))
}

async fn get_product(State(s): State<AppState>, Path(id): Path<String>) -> ApiResult<ProductView> {
    Ok(Json(s.storefront.get_product(&id).await?))
}

async fn register(
    State(s): State<AppState>,
    AnonymousSession(session): AnonymousSession,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(request) = payload?;
    Ok(Json(s.storefront.register(request, session).await?))
}

async fn login(
    State(s): State<AppState>,
    AnonymousSession(session): AnonymousSession,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> ApiResult<AuthResponse> {
    let Json(request) = payload?;
    Ok(Json(s.storefront.login(request, session).await?))
}

async fn me(State(s): State<AppState>, Bearer(token): Bearer) -> ApiResult<UserProfile> {
    Ok(Json(s.storefront.me(&token).await?))
}

async fn logout(State(s): State<AppState>, Bearer(token): Bearer) -> Result<StatusCode, ApiError> {
    s.storefront.logout(&token).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_cart(State(s): State<AppState>, CartOwner(owner): CartOwner) -> ApiResult<CartView> {
    Ok(Json(s.storefront.cart(&owner).await?))
}

async fn add_to_cart(
    State(s): State<AppState>,
    CartOwner(owner): CartOwner,
    payload: Result<Json<AddToCartRequest>, JsonRejection>,
) -> ApiResult<CartAck> {
    let Json(request) = payload?;
    Ok(Json(s.storefront.add_item(&owner, request).await?))
}

async fn update_cart_item(
    State(s): State<AppState>,
    CartOwner(owner): CartOwner,
    payload: Result<Json<UpdateCartRequest>, JsonRejection>,
) -> ApiResult<CartAck> {
    let Json(request) = payload?;
    Ok(Json(s.storefront.update_quantity(&owner, request).await?))
}

async fn remove_from_cart(
    State(s): State<AppState>,
    CartOwner(owner): CartOwner,
    Path(product_id): Path<String>,
) -> ApiResult<CartAck> {
    Ok(Json(s.storefront.remove_item(&owner, &product_id).await?))
}

async fn clear_cart(State(s): State<AppState>, CartOwner(owner): CartOwner) -> ApiResult<CartAck> {
    Ok(Json(s.storefront.clear_cart(&owner).await?))
}

async fn checkout(State(s): State<AppState>, CartOwner(owner): CartOwner) -> ApiResult<CheckoutResponse> {
    Ok(Json(s.storefront.checkout(&owner).await?))
}

async fn list_orders(State(s): State<AppState>, CartOwner(owner): CartOwner) -> ApiResult<Vec<OrderView>> {
    Ok(Json(s.storefront.orders(&owner).await?))
}
